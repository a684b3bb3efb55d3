//! In-memory filesystem driver
//!
//! Ephemeral filesystem rooted at a URI such as `mem://scratch` or
//! `s3a://bucket`. Useful for tests that need a backend without network I/O,
//! and registered for the `mem` scheme by the default backend factory.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use url::Url;

use crate::backend::{CreateOptions, FileStatus, FileSystem, ReadChunk, ReadHandle, WriteHandle};
use crate::path::{self, FsPath};

/// Default chunk size for streaming reads (64KB)
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
enum MemoryEntry {
    File { data: Vec<u8>, modified: SystemTime },
    Directory { modified: SystemTime },
}

type Entries = Arc<RwLock<HashMap<String, MemoryEntry>>>;

fn lock_poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("Lock poisoned")
}

fn not_found(path: &str) -> anyhow::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("File not found: {path}")).into()
}

/// In-memory filesystem driver
///
/// All data is stored in memory and lost when the driver is dropped.
/// Thread-safe via internal `RwLock`.
pub struct MemoryFs {
    uri: Url,
    entries: Entries,
    working_dir: RwLock<String>,
}

impl MemoryFs {
    /// Create an empty filesystem rooted at `uri` (only scheme and authority are kept)
    pub fn new(uri: &Url) -> Result<Self> {
        let scheme = uri.scheme();
        let root = match path::authority(uri) {
            Some(authority) => path::build_uri(scheme, &authority, "/")?,
            None => Url::parse(&format!("{scheme}:///"))?,
        };

        let mut entries = HashMap::new();
        // Root always exists
        entries.insert(
            "/".to_string(),
            MemoryEntry::Directory {
                modified: SystemTime::now(),
            },
        );
        Ok(Self {
            uri: root,
            entries: Arc::new(RwLock::new(entries)),
            working_dir: RwLock::new("/".to_string()),
        })
    }

    /// Create with initial file contents
    pub fn with_files(uri: &Url, files: Vec<(&str, &[u8])>) -> Result<Self> {
        let fs = Self::new(uri)?;
        {
            let mut entries = fs.entries.write().map_err(lock_poisoned)?;
            for (path, content) in files {
                let key = normalize(path);
                ensure_parents(&mut entries, &key)?;
                entries.insert(
                    key,
                    MemoryEntry::File {
                        data: content.to_vec(),
                        modified: SystemTime::now(),
                    },
                );
            }
        }
        Ok(fs)
    }

    /// Reject paths qualified for another filesystem, then map to an entry key
    fn key(&self, path: &FsPath) -> Result<String> {
        if let Some(scheme) = path.scheme() {
            let authority = path::authority(&self.uri);
            if scheme != self.uri.scheme() || path.authority() != authority.as_deref() {
                bail!("Wrong FS: {path}, expected: {}", self.uri);
            }
        }

        if path.is_absolute() {
            return Ok(normalize(path.path()));
        }
        let wd = self.working_dir.read().map_err(lock_poisoned)?;
        Ok(normalize(&format!("{wd}/{}", path.path())))
    }

    /// Qualified path for an entry key
    fn qualify(&self, key: &str) -> FsPath {
        FsPath::from_url(&self.uri).join(key)
    }

    fn status(&self, key: &str, entry: &MemoryEntry) -> FileStatus {
        match entry {
            MemoryEntry::File { data, modified } => FileStatus {
                modified: Some(*modified),
                ..FileStatus::file(self.qualify(key), data.len() as u64)
            },
            MemoryEntry::Directory { modified } => FileStatus {
                modified: Some(*modified),
                ..FileStatus::dir(self.qualify(key))
            },
        }
    }
}

/// Normalize path (ensure leading /, no trailing /, no empty segments)
fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    format!("/{}", parts.join("/"))
}

/// Create missing ancestors of `key` as directories
fn ensure_parents(entries: &mut HashMap<String, MemoryEntry>, key: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
    let mut current = String::new();
    for part in &parts[..parts.len().saturating_sub(1)] {
        current = format!("{current}/{part}");
        match entries.get(&current) {
            Some(MemoryEntry::File { .. }) => bail!("Parent path is not a directory: {current}"),
            Some(MemoryEntry::Directory { .. }) => {}
            None => {
                entries.insert(
                    current.clone(),
                    MemoryEntry::Directory {
                        modified: SystemTime::now(),
                    },
                );
            }
        }
    }
    Ok(())
}

fn is_descendant(key: &str, ancestor: &str) -> bool {
    (ancestor == "/" && key != "/") || key.starts_with(&format!("{ancestor}/"))
}

#[async_trait]
impl FileSystem for MemoryFs {
    fn scheme(&self) -> &str {
        self.uri.scheme()
    }

    fn uri(&self) -> Result<Url> {
        Ok(self.uri.clone())
    }

    fn working_directory(&self) -> Result<FsPath> {
        let wd = self.working_dir.read().map_err(lock_poisoned)?;
        Ok(self.qualify(&wd))
    }

    async fn set_working_directory(&self, path: &FsPath) -> Result<()> {
        let key = self.key(path)?;
        *self.working_dir.write().map_err(lock_poisoned)? = key;
        Ok(())
    }

    async fn open(&self, path: &FsPath, buffer_size: usize) -> Result<Box<dyn ReadHandle>> {
        let key = self.key(path)?;
        let entries = self.entries.read().map_err(lock_poisoned)?;
        match entries.get(&key) {
            Some(MemoryEntry::File { data, .. }) => {
                Ok(Box::new(MemoryReadHandle::new(data.clone(), buffer_size)))
            }
            Some(MemoryEntry::Directory { .. }) => bail!("Cannot open directory: {key}"),
            None => Err(not_found(&key)),
        }
    }

    async fn create(&self, path: &FsPath, options: CreateOptions) -> Result<Box<dyn WriteHandle>> {
        let key = self.key(path)?;
        let mut entries = self.entries.write().map_err(lock_poisoned)?;
        match entries.get(&key) {
            Some(MemoryEntry::Directory { .. }) => bail!("Cannot create file over directory: {key}"),
            Some(MemoryEntry::File { .. }) if !options.overwrite => bail!("File already exists: {key}"),
            _ => {}
        }
        ensure_parents(&mut entries, &key)?;
        entries.insert(
            key.clone(),
            MemoryEntry::File {
                data: Vec::new(),
                modified: SystemTime::now(),
            },
        );
        Ok(Box::new(MemoryWriteHandle::new(key, self.entries.clone(), Vec::new())))
    }

    async fn append(&self, path: &FsPath, _buffer_size: usize) -> Result<Box<dyn WriteHandle>> {
        let key = self.key(path)?;
        let entries = self.entries.read().map_err(lock_poisoned)?;
        match entries.get(&key) {
            Some(MemoryEntry::File { data, .. }) => Ok(Box::new(MemoryWriteHandle::new(
                key.clone(),
                self.entries.clone(),
                data.clone(),
            ))),
            Some(MemoryEntry::Directory { .. }) => bail!("Cannot append to directory: {key}"),
            None => Err(not_found(&key)),
        }
    }

    async fn rename(&self, src: &FsPath, dst: &FsPath) -> Result<bool> {
        let src = self.key(src)?;
        let dst = self.key(dst)?;
        if src == "/" || src == dst || is_descendant(&dst, &src) {
            return Ok(false);
        }

        let mut entries = self.entries.write().map_err(lock_poisoned)?;
        if !entries.contains_key(&src) || entries.contains_key(&dst) {
            return Ok(false);
        }
        ensure_parents(&mut entries, &dst)?;

        let moved: Vec<String> = entries
            .keys()
            .filter(|k| **k == src || is_descendant(k, &src))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let new = format!("{dst}{}", &old[src.len()..]);
                entries.insert(new, entry);
            }
        }
        Ok(true)
    }

    async fn delete(&self, path: &FsPath, recursive: bool) -> Result<bool> {
        let key = self.key(path)?;
        if key == "/" {
            return Ok(false);
        }

        let mut entries = self.entries.write().map_err(lock_poisoned)?;
        let children: Vec<String> = entries
            .keys()
            .filter(|k| is_descendant(k, &key))
            .cloned()
            .collect();

        match entries.get(&key) {
            None => return Ok(false),
            Some(MemoryEntry::Directory { .. }) if !children.is_empty() && !recursive => {
                bail!("Directory is not empty: {key}")
            }
            Some(_) => {}
        }

        for child in children {
            entries.remove(&child);
        }
        entries.remove(&key);
        Ok(true)
    }

    async fn list_status(&self, path: &FsPath) -> Result<Vec<FileStatus>> {
        let key = self.key(path)?;
        let entries = self.entries.read().map_err(lock_poisoned)?;

        match entries.get(&key) {
            Some(MemoryEntry::Directory { .. }) => {}
            Some(file) => return Ok(vec![self.status(&key, file)]),
            None => return Err(not_found(&key)),
        }

        let prefix = if key == "/" { "/".to_string() } else { format!("{key}/") };
        let mut results: Vec<FileStatus> = entries
            .iter()
            .filter(|(k, _)| {
                // Only direct children (no / in remainder)
                k.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(k, entry)| self.status(k, entry))
            .collect();

        results.sort_by(|a, b| a.path.path().cmp(b.path.path()));
        Ok(results)
    }

    async fn mkdirs(&self, path: &FsPath, _permission: Option<u32>) -> Result<bool> {
        let key = self.key(path)?;
        let mut entries = self.entries.write().map_err(lock_poisoned)?;
        if let Some(MemoryEntry::File { .. }) = entries.get(&key) {
            bail!("Path is a file: {key}");
        }
        ensure_parents(&mut entries, &key)?;
        entries.entry(key).or_insert(MemoryEntry::Directory {
            modified: SystemTime::now(),
        });
        Ok(true)
    }

    async fn file_status(&self, path: &FsPath) -> Result<FileStatus> {
        let key = self.key(path)?;
        let entries = self.entries.read().map_err(lock_poisoned)?;
        entries
            .get(&key)
            .map(|entry| self.status(&key, entry))
            .ok_or_else(|| not_found(&key))
    }
}

/// In-memory read handle
struct MemoryReadHandle {
    data: Vec<u8>,
    offset: usize,
    chunk_size: usize,
}

impl MemoryReadHandle {
    fn new(data: Vec<u8>, buffer_size: usize) -> Self {
        let chunk_size = if buffer_size == 0 { CHUNK_SIZE } else { buffer_size };
        Self {
            data,
            offset: 0,
            chunk_size,
        }
    }
}

#[async_trait]
impl ReadHandle for MemoryReadHandle {
    async fn read_chunk(&mut self) -> Result<ReadChunk> {
        let remaining = self.data.len().saturating_sub(self.offset);
        let chunk_size = remaining.min(self.chunk_size);

        let chunk = ReadChunk {
            data: self.data[self.offset..self.offset + chunk_size].to_vec(),
            offset: self.offset as u64,
            is_last: self.offset + chunk_size >= self.data.len(),
        };
        self.offset += chunk_size;
        Ok(chunk)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory write handle; contents become visible on close
struct MemoryWriteHandle {
    key: String,
    buffer: Vec<u8>,
    written: u64,
    entries: Entries,
}

impl MemoryWriteHandle {
    fn new(key: String, entries: Entries, existing: Vec<u8>) -> Self {
        Self {
            key,
            buffer: existing,
            written: 0,
            entries,
        }
    }
}

#[async_trait]
impl WriteHandle for MemoryWriteHandle {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.written += data.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut entries = self.entries.write().map_err(lock_poisoned)?;
        entries.insert(
            self.key.clone(),
            MemoryEntry::File {
                data: std::mem::take(&mut self.buffer),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
