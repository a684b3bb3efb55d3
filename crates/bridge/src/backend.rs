use std::time::SystemTime;

use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

use crate::path::FsPath;

/// Metadata returned by status and listing operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub path: FsPath,
    pub is_dir: bool,
    pub len: u64,
    /// Last modification time (if available)
    pub modified: Option<SystemTime>,
    /// Unix permission bits (if the backend tracks them)
    pub permission: Option<u32>,
}

impl FileStatus {
    /// Status for a file (for backends that don't support full metadata)
    pub fn file(path: FsPath, len: u64) -> Self {
        Self {
            path,
            is_dir: false,
            len,
            modified: None,
            permission: None,
        }
    }

    /// Status for a directory
    pub fn dir(path: FsPath) -> Self {
        Self {
            path,
            is_dir: true,
            len: 0,
            modified: None,
            permission: None,
        }
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// Options for [`FileSystem::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    pub overwrite: bool,
    pub buffer_size: usize,
    pub replication: u16,
    pub block_size: u64,
    pub permission: Option<u32>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            buffer_size: 64 * 1024,
            replication: 1,
            block_size: 32 * 1024 * 1024,
            permission: None,
        }
    }
}

/// Chunk of data from streaming read
#[derive(Debug)]
pub struct ReadChunk {
    pub data: Vec<u8>,
    pub offset: u64,
    pub is_last: bool,
}

/// Streaming read handle
///
/// Allows reading large files in chunks without loading entire file into memory.
#[async_trait]
pub trait ReadHandle: Send + Sync {
    /// Read next chunk (chunk size is backend-dependent)
    async fn read_chunk(&mut self) -> Result<ReadChunk>;

    /// Get total file size (if known)
    fn size(&self) -> Option<u64>;

    /// Close the handle
    async fn close(&mut self) -> Result<()>;

    /// Drain the remaining chunks into one buffer
    async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read_chunk().await?;
            out.extend_from_slice(&chunk.data);
            if chunk.is_last {
                return Ok(out);
            }
        }
    }
}

/// Streaming write handle
#[async_trait]
pub trait WriteHandle: Send + Sync {
    /// Write a chunk of data
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()>;

    /// Flush and close the handle
    async fn close(&mut self) -> Result<()>;

    /// Get bytes written so far
    fn bytes_written(&self) -> u64;
}

/// Filesystem interface - every backend driver and the pvfs facade implement this
///
/// Operations that may reach a remote store are async. Default implementations
/// return "not supported" for optional operations, allowing drivers to
/// implement only what they support.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// URI scheme this filesystem serves
    fn scheme(&self) -> &str;

    /// Root URI (scheme + authority)
    fn uri(&self) -> Result<Url>;

    /// Current working directory, used to qualify relative paths
    fn working_directory(&self) -> Result<FsPath>;

    async fn set_working_directory(&self, path: &FsPath) -> Result<()>;

    async fn open(&self, path: &FsPath, buffer_size: usize) -> Result<Box<dyn ReadHandle>>;

    async fn create(&self, path: &FsPath, options: CreateOptions) -> Result<Box<dyn WriteHandle>>;

    async fn file_status(&self, path: &FsPath) -> Result<FileStatus>;

    async fn list_status(&self, path: &FsPath) -> Result<Vec<FileStatus>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Optional operations with default implementations
    // ─────────────────────────────────────────────────────────────────────────

    async fn append(&self, _path: &FsPath, _buffer_size: usize) -> Result<Box<dyn WriteHandle>> {
        bail!("append not supported by this filesystem")
    }

    /// Returns false if the source does not exist or the destination does
    async fn rename(&self, _src: &FsPath, _dst: &FsPath) -> Result<bool> {
        bail!("rename not supported by this filesystem")
    }

    /// Returns false if nothing was deleted
    async fn delete(&self, _path: &FsPath, _recursive: bool) -> Result<bool> {
        bail!("delete not supported by this filesystem")
    }

    /// Create a directory and all parents
    async fn mkdirs(&self, _path: &FsPath, _permission: Option<u32>) -> Result<bool> {
        bail!("mkdirs not supported by this filesystem")
    }

    async fn exists(&self, path: &FsPath) -> Result<bool> {
        Ok(self.file_status(path).await.is_ok())
    }

    /// Qualify a path against this filesystem's URI and working directory
    fn make_qualified(&self, path: &FsPath) -> Result<FsPath> {
        Ok(path.make_qualified(&self.uri()?, &self.working_directory()?))
    }
}
