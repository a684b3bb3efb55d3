//! pvfs URI resolver
//!
//! Looks up the connection named by a pvfs URI's authority and hands the URI
//! to the binder registered for the connection's type. URIs with any other
//! scheme pass through untouched, so `resolve` doubles as a
//! normalize-if-needed helper.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::backend::FileSystem;
use crate::binder::{Binder, ContentPlatformBinder, ObjectStoreBinder, PassthroughBinder};
use crate::config::Configuration;
use crate::credentials::CredentialsProvider;
use crate::error::{BridgeError, Result};
use crate::factory::BackendFactory;
use crate::path::{is_pvfs_scheme, parse_uri};
use crate::registry::{self, ConnectionRegistry};

/// Rewritten URI plus the configuration the backend needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub uri: Url,
    pub conf: Configuration,
}

/// Dispatches pvfs URIs to binders by connection type
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<dyn ConnectionRegistry>,
    binders: HashMap<String, Arc<dyn Binder>>,
    fallback: Arc<dyn Binder>,
}

impl Resolver {
    /// Resolver with the standard binder table
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self::with_object_store_binder(registry, ObjectStoreBinder::default())
    }

    /// Standard binder table, with S3 credentials files read through `credentials`
    pub fn with_credentials(
        registry: Arc<dyn ConnectionRegistry>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self::with_object_store_binder(registry, ObjectStoreBinder::new(credentials))
    }

    fn with_object_store_binder(registry: Arc<dyn ConnectionRegistry>, object_store: ObjectStoreBinder) -> Self {
        let object_store: Arc<dyn Binder> = Arc::new(object_store);
        let mut resolver = Self {
            registry,
            binders: HashMap::new(),
            fallback: Arc::new(PassthroughBinder),
        };
        for kind in ["s3", "s3a", "s3n"] {
            resolver.register(kind, object_store.clone());
        }
        resolver.register("hcp", Arc::new(ContentPlatformBinder));
        resolver
    }

    /// Resolver bound to the process-wide registry
    pub fn global() -> Self {
        Self::new(registry::global())
    }

    /// Route connections of `kind` to `binder`
    pub fn register(&mut self, kind: &str, binder: Arc<dyn Binder>) {
        self.binders.insert(kind.to_lowercase(), binder);
    }

    /// Binder for a connection type; unknown types pass through
    pub fn binder_for(&self, kind: &str) -> &dyn Binder {
        self.binders
            .get(&kind.to_lowercase())
            .map_or(&*self.fallback, |binder| &**binder)
    }

    /// Rewrite a pvfs URI for its backend
    pub fn resolve(&self, uri: &Url, mut conf: Configuration) -> Result<Resolved> {
        if !is_pvfs_scheme(uri.scheme()) {
            return Ok(Resolved {
                uri: uri.clone(),
                conf,
            });
        }

        let name = uri
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BridgeError::malformed(uri.as_str(), "missing connection name"))?;

        let details = self
            .registry
            .connection_details(name)
            .ok_or_else(|| BridgeError::UnknownProfile(name.to_string()))?;

        let kind = details.connection_type();
        let target = self.binder_for(kind).bind(uri, &mut conf, details.as_ref())?;

        tracing::debug!(
            connection = %name,
            kind = %kind,
            scheme = %target.scheme(),
            "Resolved pvfs URI"
        );

        Ok(Resolved { uri: target, conf })
    }

    /// Parse and resolve a URI string
    pub fn resolve_str(&self, uri: &str, conf: Configuration) -> Result<Resolved> {
        self.resolve(&parse_uri(uri)?, conf)
    }

    /// Backend URI for a path string, resolved with an empty configuration
    pub fn real_path(&self, uri: &str) -> Result<Url> {
        Ok(self.resolve_str(uri, Configuration::new())?.uri)
    }

    /// Resolve and fetch the backend filesystem from `factory`
    pub async fn open(
        &self,
        uri: &Url,
        conf: Configuration,
        factory: &dyn BackendFactory,
    ) -> anyhow::Result<Arc<dyn FileSystem>> {
        let resolved = self.resolve(uri, conf)?;
        factory.get(&resolved.uri, &resolved.conf).await
    }
}
