//! Configuration bag handed to backend drivers, and the profile file
//!
//! Profiles are read from `~/.config/pvfs/connections.toml`:
//!
//! ```toml
//! [[connection]]
//! name = "prod"
//! type = "s3"
//! accessKey = "AK"
//! secretKey = "SK"
//!
//! [[connection]]
//! name = "hdfs1"
//! type = "hdfs"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{BridgeError, Result};
use crate::profile::{self, ConnectionDetails};

/// Backend configuration keys written by the binders
pub mod keys {
    pub const ACCESS_KEY: &str = "fs.s3a.access.key";
    pub const SECRET_KEY: &str = "fs.s3a.secret.key";
    pub const SESSION_TOKEN: &str = "fs.s3a.session.token";
    pub const CREDENTIALS_PROVIDER: &str = "fs.s3a.aws.credentials.provider";
    pub const ENDPOINT: &str = "fs.s3a.endpoint";
    pub const SIGNING_ALGORITHM: &str = "fs.s3a.signing-algorithm";
    pub const IMPL: &str = "fs.s3a.impl";
    pub const SSL_ENABLED: &str = "fs.s3a.connection.ssl.enabled";
    pub const MAX_ATTEMPTS: &str = "fs.s3a.attempts.maximum";
    /// Milliseconds
    pub const CONNECTION_TIMEOUT: &str = "fs.s3a.connection.timeout";
    pub const CLIENT_FACTORY_IMPL: &str = "fs.s3a.s3.client.factory.impl";
    pub const PROXY_HOST: &str = "fs.s3a.proxy.host";
    pub const PROXY_PORT: &str = "fs.s3a.proxy.port";
    pub const BUFFER_DIR: &str = "fs.s3.buffer.dir";

    /// Object-store driver identifier
    pub const S3A_FILESYSTEM: &str = "org.apache.hadoop.fs.s3a.S3AFileSystem";
    /// Credentials provider required when a session token is present
    pub const TEMPORARY_CREDENTIALS_PROVIDER: &str =
        "org.apache.hadoop.fs.s3a.TemporaryAWSCredentialsProvider";
    /// Signer spoken by the content platform
    pub const S3_SIGNER: &str = "S3SignerType";
    /// Client factory that trusts self-signed certificates
    pub const SELF_SIGNED_CLIENT_FACTORY: &str = "org.pentaho.hadoop.shim.SelfSignedS3ClientFactory";
    /// Client factory used when none is configured
    pub const DEFAULT_CLIENT_FACTORY: &str = "org.apache.hadoop.fs.s3a.DefaultS3ClientFactory";
}

/// Mutable string-to-string bag of backend tuning keys
///
/// Ordered so that two bags with the same entries compare and hash equal,
/// which lets the backend factory key its cache on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Configuration {
    entries: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parse a boolean value; anything but a case-insensitive "true" is false
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Configuration {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conf = Self::new();
        conf.extend(iter);
        conf
    }
}

/// On-disk profile file
#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    connection: Vec<toml::Table>,
}

/// Default profile file location
pub fn default_profiles_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pvfs")
        .join("connections.toml")
}

/// Load profiles from the default location; a missing file yields no profiles
pub fn load_profiles() -> Result<Vec<Arc<dyn ConnectionDetails>>> {
    let path = default_profiles_path();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No connection profile file");
        return Ok(Vec::new());
    }
    load_profiles_from_path(&path)
}

/// Load profiles from a TOML file
pub fn load_profiles_from_path(path: &Path) -> Result<Vec<Arc<dyn ConnectionDetails>>> {
    let content = std::fs::read_to_string(path)?;
    let mut profiles = parse_profiles(&content)?;
    for profile in &mut profiles {
        profile.set_source(path);
    }
    tracing::info!(path = %path.display(), count = profiles.len(), "Loaded connection profiles");
    Ok(profiles.into_iter().map(profile::Profile::into_shared).collect())
}

/// Parse the TOML text of a profile file
pub fn parse_profiles(content: &str) -> Result<Vec<profile::Profile>> {
    let file: ProfilesFile =
        toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))?;
    file.connection
        .into_iter()
        .map(profile::Profile::from_table)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_and_keeps_other_keys() {
        let mut conf: Configuration = [("a", "1"), ("b", "2")].into_iter().collect();
        conf.set("a", "3");
        assert_eq!(conf.get("a"), Some("3"));
        assert_eq!(conf.get("b"), Some("2"));
        assert_eq!(conf.len(), 2);
    }

    #[test]
    fn test_get_bool() {
        let mut conf = Configuration::new();
        assert!(conf.get_bool(keys::SSL_ENABLED, true));
        conf.set(keys::SSL_ENABLED, "TRUE");
        assert!(conf.get_bool(keys::SSL_ENABLED, false));
        conf.set(keys::SSL_ENABLED, "yes");
        assert!(!conf.get_bool(keys::SSL_ENABLED, true));
    }

    #[test]
    fn test_parse_profiles() {
        let profiles = parse_profiles(
            r#"
            [[connection]]
            name = "prod"
            type = "s3"
            accessKey = "AK"
            secretKey = "SK"

            [[connection]]
            name = "hcp1"
            type = "hcp"
            namespace = "ns"
            tenant = "t"
            host = "h.example"
            port = "443"
            acceptSelfSignedCertificate = true

            [[connection]]
            name = "hdfs1"
            type = "hdfs"
            "#,
        )
        .unwrap();

        let types: Vec<_> = profiles
            .iter()
            .map(|p| (p.as_details().name().to_string(), p.as_details().connection_type().to_string()))
            .collect();
        assert_eq!(
            types,
            vec![
                ("prod".to_string(), "s3".to_string()),
                ("hcp1".to_string(), "hcp".to_string()),
                ("hdfs1".to_string(), "hdfs".to_string()),
            ]
        );
    }

    fn parse_hcp(extra: &str) -> profile::HcpDetails {
        let content = format!(
            "[[connection]]\nname = \"hcp1\"\ntype = \"hcp\"\nnamespace = \"ns\"\ntenant = \"t\"\nhost = \"h\"\n{extra}"
        );
        match parse_profiles(&content).unwrap().pop() {
            Some(profile::Profile::Hcp(details)) => details,
            other => panic!("expected an hcp profile, got {other:?}"),
        }
    }

    #[test]
    fn test_hcp_self_signed_flag_as_string_or_bool() {
        assert!(parse_hcp("acceptSelfSignedCertificate = \"true\"").accept_self_signed_certificate);
        assert!(parse_hcp("acceptSelfSignedCertificate = true").accept_self_signed_certificate);
        assert!(!parse_hcp("acceptSelfSignedCertificate = \"false\"").accept_self_signed_certificate);
        assert!(!parse_hcp("").accept_self_signed_certificate);
    }

    #[test]
    fn test_hcp_port_as_integer_or_string() {
        assert_eq!(parse_hcp("port = 443").port.as_deref(), Some("443"));
        assert_eq!(parse_hcp("port = \"8443\"").port.as_deref(), Some("8443"));
        assert_eq!(parse_hcp("proxyPort = 3128").proxy_port.as_deref(), Some("3128"));
        assert_eq!(parse_hcp("").port, None);

        let props = parse_hcp("port = 443\nacceptSelfSignedCertificate = \"true\"")
            .properties()
            .unwrap();
        assert_eq!(props["port"], "443");
        assert_eq!(props["acceptSelfSignedCertificate"], "true");
    }

    #[test]
    fn test_parse_rejects_missing_type() {
        let err = parse_profiles("[[connection]]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.toml");
        std::fs::write(&path, "[[connection]]\nname = \"a\"\ntype = \"hdfs\"\n").unwrap();

        let profiles = load_profiles_from_path(&path).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].source(), Some(path.as_path()));
        // source is runtime-only and never flattened into properties
        assert!(!profiles[0].properties().unwrap().contains_key("source"));
    }
}
