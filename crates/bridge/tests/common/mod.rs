//! Common test utilities
#![allow(dead_code)] // Not every helper is used by every test file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;

use pvfs_bridge::{MemoryRegistry, Resolver};

/// Temp directory plus a registry the test can populate
pub struct TestHarness {
    pub tmp_dir: TempDir,
    pub registry: Arc<MemoryRegistry>,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        init_tracing();
        Ok(Self {
            tmp_dir: TempDir::new().context("Failed to create temp directory")?,
            registry: Arc::new(MemoryRegistry::new()),
        })
    }

    /// Absolute path for a file in the temp directory
    pub fn path(&self, rel_path: &str) -> PathBuf {
        self.tmp_dir.path().join(rel_path)
    }

    pub fn write_file(&self, rel_path: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(rel_path);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
        Ok(path)
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.registry.clone())
    }
}

/// Route tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
