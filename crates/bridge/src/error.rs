//! Error kinds surfaced by the resolver, binders and delegating filesystem

use thiserror::Error;

/// Result alias for the resolution layer
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The registry has no profile under this name
    #[error("Could not find named VFS connection: '{0}'")]
    UnknownProfile(String),

    /// URI lacks a scheme or authority, or cannot be parsed at all
    #[error("Malformed pvfs URI '{uri}': {reason}")]
    MalformedUri { uri: String, reason: String },

    /// Object-store path has no bucket segment
    #[error("Malformed object-store path '{0}': expected /<bucket>/<key>")]
    MalformedObjectStorePath(String),

    /// No static keys and no usable credentials file
    #[error("Missing credentials for connection '{profile}': {reason}")]
    MissingCredentials { profile: String, reason: String },

    /// A profile attribute could not be read or stringified
    #[error("Cannot read attribute '{attribute}' of connection profile: {reason}")]
    ProfileAccess { attribute: String, reason: String },

    /// Operation needs a pinned backend but none has been pinned yet
    #[error("Filesystem not initialized: {0}")]
    NotInitialized(String),

    /// A pinned filesystem received a path for a different profile
    #[error("Filesystem is pinned to connection '{pinned}' but received a path for '{requested}'")]
    ProfileMismatch { pinned: String, requested: String },

    /// Resolution or driver construction failed while pinning the backend
    #[error("Backend for '{uri}' could not be initialized: {source}")]
    BackendUnavailable {
        uri: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Profile file or configuration value is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn malformed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}
