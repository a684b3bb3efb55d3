pub mod backend;
pub mod binder;
pub mod client;
pub mod config;
pub mod credentials;
pub mod delegating;
pub mod error;
pub mod factory;
pub mod memory;
pub mod path;
pub mod profile;
pub mod registry;
pub mod resolver;

pub use backend::{CreateOptions, FileStatus, FileSystem, ReadHandle, WriteHandle};
pub use binder::{Binder, ContentPlatformBinder, ObjectStoreBinder, PassthroughBinder};
pub use client::{client_factory_for, ClientFactory, DefaultClientFactory, SelfSignedClientFactory};
pub use config::Configuration;
pub use credentials::{Credentials, CredentialsProvider, PropertiesFileCredentials};
pub use delegating::DelegatingFileSystem;
pub use error::{BridgeError, Result};
pub use factory::{BackendFactory, CachingFactory};
pub use memory::MemoryFs;
pub use path::FsPath;
pub use profile::{ConnectionDetails, GenericDetails, HcpDetails, S3Details};
pub use registry::{ConnectionRegistry, MemoryRegistry};
pub use resolver::{Resolved, Resolver};
