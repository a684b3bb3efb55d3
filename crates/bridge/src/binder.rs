//! Binders rewrite a pvfs URI for one backend family
//!
//! Each binder turns `pvfs://<connection>/<path>` into the concrete backend
//! URI and writes the keys that backend needs into the configuration bag.
//! Binders only add or overwrite keys they own and never touch the network.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use secrecy::ExposeSecret;
use url::Url;

use crate::config::{keys, Configuration};
use crate::credentials::{CredentialsProvider, PropertiesFileCredentials};
use crate::error::{BridgeError, Result};
use crate::path::{build_uri, SEPARATOR};
use crate::profile::{ConnectionDetails, PropertyMap};

/// Scheme of the object-store driver every S3-compatible binder targets
pub const S3A_SCHEME: &str = "s3a";

/// Rewrites a pvfs URI and populates backend configuration
pub trait Binder: Send + Sync {
    fn bind(&self, uri: &Url, conf: &mut Configuration, profile: &dyn ConnectionDetails) -> Result<Url>;
}

fn prop<'a>(props: &'a PropertyMap, key: &str) -> &'a str {
    props.get(key).map_or("", String::as_str)
}

fn set_driver_defaults(conf: &mut Configuration) {
    conf.set(keys::IMPL, keys::S3A_FILESYSTEM);
    conf.set(keys::SSL_ENABLED, "true");
    conf.set(keys::MAX_ATTEMPTS, "3");
}

// ─────────────────────────────────────────────────────────────────────────────
// Object store (s3, s3a, s3n)
// ─────────────────────────────────────────────────────────────────────────────

/// Binds S3 connections: `pvfs://conn/<bucket>/<key>` -> `s3a://<bucket>/<key>`
pub struct ObjectStoreBinder {
    credentials: Arc<dyn CredentialsProvider>,
}

impl Default for ObjectStoreBinder {
    fn default() -> Self {
        Self::new(Arc::new(PropertiesFileCredentials))
    }
}

impl ObjectStoreBinder {
    /// Use `credentials` when a profile has no static keys
    pub fn new(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self { credentials }
    }

    /// Split `/<bucket>/<key...>` into bucket and `/<key...>`
    ///
    /// Trailing empty segments are ignored, so `/b/k/` keys on `/k`.
    pub fn split_bucket(path: &str) -> Result<(&str, String)> {
        let mut segments: Vec<&str> = path.split('/').collect();
        while segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        match segments.as_slice() {
            [_, bucket, key @ ..] if !bucket.is_empty() => {
                Ok((*bucket, format!("{SEPARATOR}{}", key.join(SEPARATOR))))
            }
            _ => Err(BridgeError::MalformedObjectStorePath(path.to_string())),
        }
    }
}

impl Binder for ObjectStoreBinder {
    fn bind(&self, uri: &Url, conf: &mut Configuration, profile: &dyn ConnectionDetails) -> Result<Url> {
        let (bucket, key_path) = Self::split_bucket(uri.path())?;
        let target = build_uri(S3A_SCHEME, bucket, &key_path)?;

        let props = profile.properties()?;
        let mut access_key = prop(&props, "accessKey").to_string();
        let mut secret_key = prop(&props, "secretKey").to_string();
        let mut session_token = prop(&props, "sessionToken").to_string();

        if access_key.is_empty() || secret_key.is_empty() {
            let location = prop(&props, "credentialsFilePath");
            if location.is_empty() {
                return Err(BridgeError::MissingCredentials {
                    profile: profile.name().to_string(),
                    reason: "no access/secret key and no credentialsFilePath".to_string(),
                });
            }
            let creds = self
                .credentials
                .credentials(location)
                .map_err(|e| BridgeError::MissingCredentials {
                    profile: profile.name().to_string(),
                    reason: format!("{location}: {e}"),
                })?;
            access_key = creds.access_key;
            secret_key = creds.secret_key.expose_secret().clone();
            if let Some(token) = creds.session_token {
                session_token = token.expose_secret().clone();
            }
        }

        conf.set(keys::ACCESS_KEY, access_key);
        conf.set(keys::SECRET_KEY, secret_key);
        if !session_token.is_empty() {
            conf.set(keys::CREDENTIALS_PROVIDER, keys::TEMPORARY_CREDENTIALS_PROVIDER);
            conf.set(keys::SESSION_TOKEN, session_token);
        }
        set_driver_defaults(conf);
        conf.set(keys::BUFFER_DIR, std::env::temp_dir().display().to_string());

        Ok(target)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content platform (hcp)
// ─────────────────────────────────────────────────────────────────────────────

/// Binds HCP connections onto the object-store driver
///
/// HCP speaks S3 but derives its keys from the account: the access key is the
/// base64 of the username and the secret key the MD5 hex of the password.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentPlatformBinder;

impl ContentPlatformBinder {
    pub fn access_key(username: &str) -> String {
        STANDARD.encode(username.as_bytes())
    }

    pub fn secret_key(password: &str) -> String {
        hex::encode(Md5::digest(password.as_bytes()))
    }

    /// `tenant.host[:port]`
    pub fn endpoint(tenant: &str, host: &str, port: &str) -> String {
        if port.is_empty() {
            format!("{tenant}.{host}")
        } else {
            format!("{tenant}.{host}:{port}")
        }
    }
}

impl Binder for ContentPlatformBinder {
    fn bind(&self, uri: &Url, conf: &mut Configuration, profile: &dyn ConnectionDetails) -> Result<Url> {
        let props = profile.properties()?;
        let namespace = prop(&props, "namespace");
        if namespace.is_empty() {
            return Err(BridgeError::Config(format!(
                "HCP connection '{}' has no namespace",
                profile.name()
            )));
        }
        let target = build_uri(S3A_SCHEME, namespace, uri.path())?;

        conf.set(keys::ACCESS_KEY, Self::access_key(prop(&props, "username")));
        conf.set(keys::SECRET_KEY, Self::secret_key(prop(&props, "password")));
        conf.set(
            keys::ENDPOINT,
            Self::endpoint(prop(&props, "tenant"), prop(&props, "host"), prop(&props, "port")),
        );
        conf.set(keys::SIGNING_ALGORITHM, keys::S3_SIGNER);
        set_driver_defaults(conf);

        let proxy_host = prop(&props, "proxyHost");
        if !proxy_host.is_empty() {
            conf.set(keys::PROXY_HOST, proxy_host);
        }
        let proxy_port = prop(&props, "proxyPort");
        if !proxy_port.is_empty() {
            conf.set(keys::PROXY_PORT, proxy_port);
        }

        if prop(&props, "acceptSelfSignedCertificate").eq_ignore_ascii_case("true") {
            tracing::warn!(
                connection = %profile.name(),
                "Connection accepts self-signed certificates; TLS verification is disabled"
            );
            conf.set(keys::CLIENT_FACTORY_IMPL, keys::SELF_SIGNED_CLIENT_FACTORY);
        }

        Ok(target)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Passthrough
// ─────────────────────────────────────────────────────────────────────────────

/// Swaps the scheme for the profile type and leaves configuration alone
///
/// `pvfs://hdfs1/tmp/x` with an "hdfs" profile becomes `hdfs://hdfs1/tmp/x`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughBinder;

impl Binder for PassthroughBinder {
    fn bind(&self, uri: &Url, _conf: &mut Configuration, profile: &dyn ConnectionDetails) -> Result<Url> {
        // The connection name is the authority; a port on the pvfs URI is dropped
        let name = uri
            .host_str()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| profile.name());
        build_uri(&profile.connection_type().to_lowercase(), name, uri.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{GenericDetails, HcpDetails, S3Details};

    struct FixedCredentials;

    impl CredentialsProvider for FixedCredentials {
        fn credentials(&self, location: &str) -> Result<crate::credentials::Credentials> {
            PropertiesFileCredentials::parse(&format!(
                "accessKey=from:{location}\nsecretKey=S\nsessionToken=T\n"
            ))
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_split_bucket() {
        assert_eq!(
            ObjectStoreBinder::split_bucket("/b/k1/k2").unwrap(),
            ("b", "/k1/k2".to_string())
        );
        assert_eq!(ObjectStoreBinder::split_bucket("/b").unwrap(), ("b", "/".to_string()));
        assert_eq!(ObjectStoreBinder::split_bucket("/b/k/").unwrap(), ("b", "/k".to_string()));
        for bad in ["", "/", "//k"] {
            assert!(matches!(
                ObjectStoreBinder::split_bucket(bad),
                Err(BridgeError::MalformedObjectStorePath(_))
            ));
        }
    }

    #[test]
    fn test_object_store_static_keys() {
        let profile = S3Details::new("prod").with_keys("AK", "SK");
        let mut conf = Configuration::new();
        conf.set("unrelated", "kept");

        let target = ObjectStoreBinder::default()
            .bind(&url("pvfs://prod/bucket1/dir/file.csv"), &mut conf, &profile)
            .unwrap();

        assert_eq!(target.as_str(), "s3a://bucket1/dir/file.csv");
        assert_eq!(conf.get(keys::ACCESS_KEY), Some("AK"));
        assert_eq!(conf.get(keys::SECRET_KEY), Some("SK"));
        assert_eq!(conf.get(keys::IMPL), Some(keys::S3A_FILESYSTEM));
        assert_eq!(conf.get(keys::MAX_ATTEMPTS), Some("3"));
        assert!(conf.contains(keys::BUFFER_DIR));
        assert!(!conf.contains(keys::SESSION_TOKEN));
        assert_eq!(conf.get("unrelated"), Some("kept"));
    }

    #[test]
    fn test_object_store_static_session_token() {
        let profile = S3Details::new("prod").with_keys("AK", "SK").with_session_token("TK");
        let mut conf = Configuration::new();
        ObjectStoreBinder::default()
            .bind(&url("pvfs://prod/b/o"), &mut conf, &profile)
            .unwrap();

        assert_eq!(conf.get(keys::SESSION_TOKEN), Some("TK"));
        assert_eq!(
            conf.get(keys::CREDENTIALS_PROVIDER),
            Some(keys::TEMPORARY_CREDENTIALS_PROVIDER)
        );
    }

    #[test]
    fn test_object_store_falls_back_to_provider() {
        let profile = S3Details::new("tmp").with_credentials_file("/etc/c.props");
        let mut conf = Configuration::new();
        ObjectStoreBinder::new(Arc::new(FixedCredentials))
            .bind(&url("pvfs://tmp/b/obj"), &mut conf, &profile)
            .unwrap();

        assert_eq!(conf.get(keys::ACCESS_KEY), Some("from:/etc/c.props"));
        assert_eq!(conf.get(keys::SESSION_TOKEN), Some("T"));
    }

    #[test]
    fn test_object_store_missing_credentials() {
        let profile = S3Details::new("tmp").with_keys("AK", "");
        let mut conf = Configuration::new();
        let err = ObjectStoreBinder::default()
            .bind(&url("pvfs://tmp/b/obj"), &mut conf, &profile)
            .unwrap_err();

        assert!(matches!(err, BridgeError::MissingCredentials { .. }));
        assert!(conf.is_empty());
    }

    #[test]
    fn test_object_store_malformed_path_leaves_conf() {
        let profile = S3Details::new("prod").with_keys("AK", "SK");
        let mut conf = Configuration::new();
        let err = ObjectStoreBinder::default()
            .bind(&url("pvfs://prod/"), &mut conf, &profile)
            .unwrap_err();

        assert!(matches!(err, BridgeError::MalformedObjectStorePath(_)));
        assert!(conf.is_empty());
    }

    #[test]
    fn test_hcp_derived_keys() {
        assert_eq!(ContentPlatformBinder::access_key("u"), "dQ==");
        assert_eq!(
            ContentPlatformBinder::secret_key("p"),
            "83878c91171338902e0fe0fb97a8c47a"
        );
        assert_eq!(ContentPlatformBinder::endpoint("t", "h", ""), "t.h");
        assert_eq!(ContentPlatformBinder::endpoint("t", "h", "443"), "t.h:443");
    }

    #[test]
    fn test_hcp_bind() {
        let profile = HcpDetails::new("hcp1", "ns", "t", "h.example")
            .with_user("u", "p")
            .with_proxy("proxy.local", "3128");
        let mut conf = Configuration::new();
        let target = ContentPlatformBinder
            .bind(&url("pvfs://hcp1/a/b"), &mut conf, &profile)
            .unwrap();

        assert_eq!(target.as_str(), "s3a://ns/a/b");
        assert_eq!(conf.get(keys::ENDPOINT), Some("t.h.example"));
        assert_eq!(conf.get(keys::SIGNING_ALGORITHM), Some("S3SignerType"));
        assert_eq!(conf.get(keys::PROXY_HOST), Some("proxy.local"));
        assert_eq!(conf.get(keys::PROXY_PORT), Some("3128"));
        assert!(!conf.contains(keys::CLIENT_FACTORY_IMPL));
    }

    #[test]
    fn test_hcp_requires_namespace() {
        let profile = HcpDetails::new("hcp1", "", "t", "h");
        let err = ContentPlatformBinder
            .bind(&url("pvfs://hcp1/a"), &mut Configuration::new(), &profile)
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_passthrough() {
        let profile = GenericDetails::new("hdfs1", "HDFS");
        let mut conf = Configuration::new();
        let target = PassthroughBinder
            .bind(&url("pvfs://hdfs1/tmp/x"), &mut conf, &profile)
            .unwrap();

        assert_eq!(target.as_str(), "hdfs://hdfs1/tmp/x");
        assert!(conf.is_empty());
    }

    #[test]
    fn test_passthrough_drops_port() {
        let profile = GenericDetails::new("hdfs1", "hdfs");
        let target = PassthroughBinder
            .bind(&url("pvfs://hdfs1:8020/tmp/x"), &mut Configuration::new(), &profile)
            .unwrap();
        assert_eq!(target.as_str(), "hdfs://hdfs1/tmp/x");
    }
}
