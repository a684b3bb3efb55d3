//! Backend filesystem factory
//!
//! Produces a driver for a resolved `(uri, configuration)` pair. The caching
//! factory constructs drivers lazily from a per-scheme constructor table and
//! hands out the same instance for the same scheme, authority and
//! configuration.

#![allow(clippy::non_std_lazy_statics)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::backend::FileSystem;
use crate::config::Configuration;
use crate::memory::MemoryFs;
use crate::path;

/// Builds a driver for one scheme
pub type FsConstructor = Box<dyn Fn(&Url, &Configuration) -> Result<Arc<dyn FileSystem>> + Send + Sync>;

/// Source of backend filesystem drivers
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn get(&self, uri: &Url, conf: &Configuration) -> Result<Arc<dyn FileSystem>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    scheme: String,
    authority: Option<String>,
    conf: Configuration,
}

lazy_static::lazy_static! {
    static ref GLOBAL_FACTORY: Arc<CachingFactory> = Arc::new(CachingFactory::with_defaults());
}

/// Process-wide factory (only the `mem` scheme is registered by default)
pub fn global() -> Arc<CachingFactory> {
    GLOBAL_FACTORY.clone()
}

/// Factory with lazy per-scheme construction and an instance cache
pub struct CachingFactory {
    /// Constructors by lowercase scheme
    constructors: RwLock<HashMap<String, FsConstructor>>,
    /// Constructed drivers
    instances: Mutex<HashMap<CacheKey, Arc<dyn FileSystem>>>,
}

impl Default for CachingFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CachingFactory {
    /// Factory with no schemes registered
    pub fn new() -> Self {
        Self::from_constructors(HashMap::new())
    }

    /// Factory with the in-memory driver registered for `mem`
    pub fn with_defaults() -> Self {
        let mut constructors: HashMap<String, FsConstructor> = HashMap::new();
        constructors.insert("mem".to_string(), memory_constructor());
        Self::from_constructors(constructors)
    }

    fn from_constructors(constructors: HashMap<String, FsConstructor>) -> Self {
        Self {
            constructors: RwLock::new(constructors),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register a driver constructor (used on first `get` for the scheme)
    pub async fn register(&self, scheme: &str, constructor: FsConstructor) {
        self.constructors
            .write()
            .await
            .insert(scheme.to_lowercase(), constructor);
    }

    /// Registered schemes, sorted
    pub async fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.constructors.read().await.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Number of cached drivers
    pub async fn len(&self) -> usize {
        self.instances.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.instances.lock().await.is_empty()
    }

    /// Drop every cached driver
    pub async fn clear(&self) {
        self.instances.lock().await.clear();
    }
}

#[async_trait]
impl BackendFactory for CachingFactory {
    async fn get(&self, uri: &Url, conf: &Configuration) -> Result<Arc<dyn FileSystem>> {
        let key = CacheKey {
            scheme: uri.scheme().to_lowercase(),
            authority: path::authority(uri),
            conf: conf.clone(),
        };

        // Held across construction so concurrent callers share one driver
        let mut instances = self.instances.lock().await;
        if let Some(fs) = instances.get(&key) {
            return Ok(fs.clone());
        }

        let fs = {
            let constructors = self.constructors.read().await;
            let Some(constructor) = constructors.get(&key.scheme) else {
                bail!("No filesystem for scheme: {}", key.scheme);
            };
            constructor(uri, conf)?
        };

        tracing::info!(
            scheme = %key.scheme,
            authority = key.authority.as_deref().unwrap_or_default(),
            "Created backend filesystem"
        );
        instances.insert(key, fs.clone());
        Ok(fs)
    }
}

/// Constructor for [`MemoryFs`] drivers
pub fn memory_constructor() -> FsConstructor {
    Box::new(|uri, _conf| Ok(Arc::new(MemoryFs::new(uri)?)))
}
