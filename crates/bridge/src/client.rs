//! HTTP clients for S3-compatible object stores
//!
//! The object-store driver asks [`client_factory_for`] which factory the
//! configuration selects (`fs.s3a.s3.client.factory.impl`) and builds its
//! client from it.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{keys, Configuration};
use crate::error::BridgeError;

/// Timeout used when `fs.s3a.connection.timeout` is unset
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the HTTP client an object-store driver talks through
pub trait ClientFactory: Send + Sync {
    /// Identifier stored under `fs.s3a.s3.client.factory.impl`
    fn name(&self) -> &'static str;

    fn create_client(&self, conf: &Configuration) -> Result<reqwest::Client>;
}

/// Standard client: certificate validation on, HTTPS-only when SSL is enabled
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClientFactory;

impl DefaultClientFactory {
    fn builder(conf: &Configuration) -> Result<reqwest::ClientBuilder> {
        let timeout = match conf.get(keys::CONNECTION_TIMEOUT) {
            Some(ms) => Duration::from_millis(
                ms.trim()
                    .parse()
                    .with_context(|| format!("Invalid {}: {ms}", keys::CONNECTION_TIMEOUT))?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .https_only(conf.get_bool(keys::SSL_ENABLED, true));

        if let Some(host) = conf.get(keys::PROXY_HOST).filter(|h| !h.is_empty()) {
            let proxy_url = match conf.get(keys::PROXY_PORT).filter(|p| !p.is_empty()) {
                Some(port) => format!("http://{host}:{port}"),
                None => format!("http://{host}"),
            };
            let proxy = reqwest::Proxy::all(&proxy_url)
                .with_context(|| format!("Invalid proxy: {proxy_url}"))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder)
    }
}

impl ClientFactory for DefaultClientFactory {
    fn name(&self) -> &'static str {
        keys::DEFAULT_CLIENT_FACTORY
    }

    fn create_client(&self, conf: &Configuration) -> Result<reqwest::Client> {
        Ok(Self::builder(conf)?.build()?)
    }
}

/// Client that accepts self-signed certificates
///
/// With rustls this also skips hostname verification, so it trusts any
/// server presenting any certificate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfSignedClientFactory;

impl ClientFactory for SelfSignedClientFactory {
    fn name(&self) -> &'static str {
        keys::SELF_SIGNED_CLIENT_FACTORY
    }

    fn create_client(&self, conf: &Configuration) -> Result<reqwest::Client> {
        tracing::warn!(
            endpoint = conf.get(keys::ENDPOINT).unwrap_or_default(),
            "Building object-store client without certificate verification"
        );
        Ok(DefaultClientFactory::builder(conf)?
            .danger_accept_invalid_certs(true)
            .build()?)
    }
}

/// Factory selected by `fs.s3a.s3.client.factory.impl`
pub fn client_factory_for(conf: &Configuration) -> crate::Result<Box<dyn ClientFactory>> {
    match conf.get(keys::CLIENT_FACTORY_IMPL) {
        None | Some(keys::DEFAULT_CLIENT_FACTORY) => Ok(Box::new(DefaultClientFactory)),
        Some(keys::SELF_SIGNED_CLIENT_FACTORY) => {
            tracing::warn!("Self-signed certificates accepted for object-store client");
            Ok(Box::new(SelfSignedClientFactory))
        }
        Some(other) => Err(BridgeError::Config(format!("Unknown client factory: {other}"))),
    }
}
