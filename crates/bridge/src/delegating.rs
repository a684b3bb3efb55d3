//! Delegating pvfs filesystem
//!
//! Advertises the `pvfs` scheme and forwards every operation to a backend
//! driver. The backend is chosen by resolving the first path the instance
//! sees and stays pinned for the lifetime of the instance.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use url::Url;

use crate::backend::{CreateOptions, FileStatus, FileSystem, ReadHandle, WriteHandle};
use crate::config::Configuration;
use crate::error::BridgeError;
use crate::factory::{self, BackendFactory};
use crate::path::{FsPath, PVFS_SCHEME};
use crate::resolver::Resolver;

struct Pinned {
    /// Connection name of the path that pinned the backend (pvfs paths only)
    profile: Option<String>,
    fs: Arc<dyn FileSystem>,
}

/// Filesystem for `pvfs://<connection>/<path>` URIs
pub struct DelegatingFileSystem {
    resolver: Resolver,
    factory: Arc<dyn BackendFactory>,
    conf: Configuration,
    pinned: OnceCell<Pinned>,
}

impl DelegatingFileSystem {
    pub fn new(resolver: Resolver, factory: Arc<dyn BackendFactory>, conf: Configuration) -> Self {
        Self {
            resolver,
            factory,
            conf,
            pinned: OnceCell::new(),
        }
    }

    /// Filesystem wired to the process-wide registry and backend factory
    pub fn with_conf(conf: Configuration) -> Self {
        Self::new(Resolver::global(), factory::global(), conf)
    }

    /// Configuration every resolution starts from
    pub fn conf(&self) -> &Configuration {
        &self.conf
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.initialized()
    }

    /// Pinned backend, if any operation has run yet
    pub fn backend(&self) -> Option<Arc<dyn FileSystem>> {
        self.pinned.get().map(|pinned| pinned.fs.clone())
    }

    /// Backend form of `path`; non-pvfs paths are returned unchanged
    pub fn rewrite(&self, path: &FsPath) -> crate::Result<FsPath> {
        match path.scheme() {
            Some(scheme) if scheme.eq_ignore_ascii_case(PVFS_SCHEME) => {
                let resolved = self.resolver.resolve(&path.to_url()?, self.conf.clone())?;
                Ok(FsPath::from(resolved.uri))
            }
            _ => Ok(path.clone()),
        }
    }

    fn pinned(&self, operation: &str) -> crate::Result<&Pinned> {
        self.pinned
            .get()
            .ok_or_else(|| BridgeError::NotInitialized(operation.to_string()))
    }

    /// Pinned backend, pinning it from `path` on first use
    async fn backend_for(&self, path: &FsPath) -> Result<Arc<dyn FileSystem>> {
        let pinned = self.pinned.get_or_try_init(|| self.pin(path)).await?;

        if let (Some(pinned_profile), Some(requested)) = (&pinned.profile, profile_of(path)) {
            if *pinned_profile != requested {
                return Err(BridgeError::ProfileMismatch {
                    pinned: pinned_profile.clone(),
                    requested,
                }
                .into());
            }
        }
        Ok(pinned.fs.clone())
    }

    async fn pin(&self, path: &FsPath) -> Result<Pinned, BridgeError> {
        let fs = self
            .connect(path)
            .await
            .map_err(|source| BridgeError::BackendUnavailable {
                uri: path.to_string(),
                source: source.into(),
            })?;

        tracing::info!(path = %path, backend = %fs.scheme(), "Pinned backend filesystem");
        Ok(Pinned {
            profile: profile_of(path),
            fs,
        })
    }

    async fn connect(&self, path: &FsPath) -> Result<Arc<dyn FileSystem>> {
        let uri = path.to_url()?;
        self.resolver
            .open(&uri, self.conf.clone(), self.factory.as_ref())
            .await
    }
}

/// Connection named by a pvfs path (the authority without any port)
fn profile_of(path: &FsPath) -> Option<String> {
    let authority = path
        .scheme()
        .filter(|scheme| scheme.eq_ignore_ascii_case(PVFS_SCHEME))
        .and(path.authority())?;
    let name = authority.rsplit_once(':').map_or(authority, |(host, _)| host);
    Some(name.to_string())
}

#[async_trait]
impl FileSystem for DelegatingFileSystem {
    fn scheme(&self) -> &str {
        PVFS_SCHEME
    }

    fn uri(&self) -> Result<Url> {
        self.pinned("uri")?.fs.uri()
    }

    fn working_directory(&self) -> Result<FsPath> {
        self.pinned("working_directory")?.fs.working_directory()
    }

    async fn set_working_directory(&self, path: &FsPath) -> Result<()> {
        let fs = self.backend_for(path).await?;
        fs.set_working_directory(&self.rewrite(path)?).await
    }

    async fn open(&self, path: &FsPath, buffer_size: usize) -> Result<Box<dyn ReadHandle>> {
        let fs = self.backend_for(path).await?;
        fs.open(&self.rewrite(path)?, buffer_size).await
    }

    async fn create(&self, path: &FsPath, options: CreateOptions) -> Result<Box<dyn WriteHandle>> {
        let fs = self.backend_for(path).await?;
        fs.create(&self.rewrite(path)?, options).await
    }

    async fn file_status(&self, path: &FsPath) -> Result<FileStatus> {
        let fs = self.backend_for(path).await?;
        fs.file_status(&self.rewrite(path)?).await
    }

    async fn list_status(&self, path: &FsPath) -> Result<Vec<FileStatus>> {
        let fs = self.backend_for(path).await?;
        fs.list_status(&self.rewrite(path)?).await
    }

    async fn append(&self, path: &FsPath, buffer_size: usize) -> Result<Box<dyn WriteHandle>> {
        let fs = self.backend_for(path).await?;
        fs.append(&self.rewrite(path)?, buffer_size).await
    }

    async fn rename(&self, src: &FsPath, dst: &FsPath) -> Result<bool> {
        let fs = self.backend_for(src).await?;
        // Destination must belong to the pinned connection too
        self.backend_for(dst).await?;
        fs.rename(&self.rewrite(src)?, &self.rewrite(dst)?).await
    }

    async fn delete(&self, path: &FsPath, recursive: bool) -> Result<bool> {
        let fs = self.backend_for(path).await?;
        fs.delete(&self.rewrite(path)?, recursive).await
    }

    async fn mkdirs(&self, path: &FsPath, permission: Option<u32>) -> Result<bool> {
        let fs = self.backend_for(path).await?;
        fs.mkdirs(&self.rewrite(path)?, permission).await
    }

    fn make_qualified(&self, path: &FsPath) -> Result<FsPath> {
        let rewritten = self.rewrite(path)?;
        Ok(rewritten.make_qualified(&self.uri()?, &self.working_directory()?))
    }
}
