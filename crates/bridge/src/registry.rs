//! Connection profile registry
//!
//! The resolver only needs name lookups. [`MemoryRegistry`] is the in-process
//! implementation; [`global`] is the process-wide instance used by the
//! default constructors at the outer API boundary.

#![allow(clippy::non_std_lazy_statics)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config;
use crate::error::Result;
use crate::profile::ConnectionDetails;

/// Source of connection profiles, keyed by logical name
pub trait ConnectionRegistry: Send + Sync {
    fn connection_details(&self, name: &str) -> Option<Arc<dyn ConnectionDetails>>;
}

lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<MemoryRegistry> = Arc::new(MemoryRegistry::new());
}

/// Process-wide registry
pub fn global() -> Arc<MemoryRegistry> {
    GLOBAL_REGISTRY.clone()
}

type Profiles = HashMap<String, Arc<dyn ConnectionDetails>>;

/// Thread-safe in-memory registry
#[derive(Default)]
pub struct MemoryRegistry {
    profiles: RwLock<Profiles>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated from the default profile file
    pub fn from_default_file() -> Result<Self> {
        let registry = Self::new();
        for profile in config::load_profiles()? {
            registry.insert_shared(profile);
        }
        Ok(registry)
    }

    /// Registry pre-populated from a profile file
    pub fn from_file(path: &Path) -> Result<Self> {
        let registry = Self::new();
        for profile in config::load_profiles_from_path(path)? {
            registry.insert_shared(profile);
        }
        Ok(registry)
    }

    /// Register a profile under its own name, replacing any previous one
    pub fn insert<D: ConnectionDetails + 'static>(&self, details: D) {
        self.insert_shared(Arc::new(details));
    }

    pub fn insert_shared(&self, details: Arc<dyn ConnectionDetails>) {
        let name = details.name().to_string();
        self.write().insert(name, details);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn ConnectionDetails>> {
        self.write().remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    // Every update is a single map insert or remove, so a poisoned map is still consistent
    fn read(&self) -> RwLockReadGuard<'_, Profiles> {
        self.profiles.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Connection registry lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Profiles> {
        self.profiles.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Connection registry lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

impl ConnectionRegistry for MemoryRegistry {
    fn connection_details(&self, name: &str) -> Option<Arc<dyn ConnectionDetails>> {
        self.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{GenericDetails, S3Details};

    #[test]
    fn test_insert_and_lookup() {
        let registry = MemoryRegistry::new();
        registry.insert(S3Details::new("prod"));
        registry.insert(GenericDetails::new("hdfs1", "hdfs"));

        let details = registry.connection_details("prod").unwrap();
        assert_eq!(details.connection_type(), "s3");
        assert!(registry.connection_details("nope").is_none());
        assert_eq!(registry.names(), vec!["hdfs1", "prod"]);
    }

    #[test]
    fn test_insert_replaces() {
        let registry = MemoryRegistry::new();
        registry.insert(GenericDetails::new("x", "hdfs"));
        registry.insert(GenericDetails::new("x", "maprfs"));

        assert_eq!(registry.connection_details("x").unwrap().connection_type(), "maprfs");
        assert!(registry.remove("x").is_some());
        assert!(registry.connection_details("x").is_none());
    }

    #[test]
    fn test_poisoned_lock_keeps_registrations() {
        let registry = Arc::new(MemoryRegistry::new());
        let holder = registry.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.profiles.write().unwrap();
            panic!("panic while holding the registry lock");
        })
        .join();
        assert!(registry.profiles.is_poisoned());

        registry.insert(GenericDetails::new("x", "hdfs"));
        assert_eq!(registry.connection_details("x").unwrap().connection_type(), "hdfs");
        assert_eq!(registry.names(), vec!["x"]);
        assert!(registry.remove("x").is_some());
    }

    #[test]
    fn test_global_is_shared() {
        global().insert(GenericDetails::new("global-registry-test", "hdfs"));
        assert!(global().connection_details("global-registry-test").is_some());
        global().remove("global-registry-test");
    }
}
