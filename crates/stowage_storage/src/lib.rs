//! # Stowage Storage
//!
//! One file storage interface over interchangeable media.
//!
//! Callers save, open, delete and address files through [`Storage`]; the
//! configured backend decides where the bytes go. Names are always logical,
//! `/`-separated and relative to the backend's root, and no name can resolve
//! outside that root.
//!
//! ## Available Backends
//!
//! - [`FileSystemStorage`] - a local directory
//! - [`S3Storage`] - an S3-compatible bucket, through an [`ObjectStoreConnector`]
//! - [`CloudFilesStorage`] - a CloudFiles-style container, through a [`ContainerConnector`]
//! - [`MemoryStorage`] - process memory, for tests
//!
//! Cloud SDKs are not bundled. Hosts plug them in through the capability
//! traits in [`client`]; [`registry::Registry`] wires configuration to a
//! backend.
//!
//! ## Example
//!
//! ```rust
//! use stowage_storage::{MemoryStorage, OpenMode, SharedMemoryStore, Storage, Whence};
//!
//! let storage = Storage::new(MemoryStorage::with_store("docs", SharedMemoryStore::new()));
//! storage.save("numbers.txt", "123123").unwrap();
//!
//! let mut file = storage.open("numbers.txt", OpenMode::Read).unwrap();
//! assert_eq!(file.read(Some(3)).unwrap(), b"123");
//! file.seek(-3, Whence::Current).unwrap();
//! assert_eq!(file.read(None).unwrap(), b"123123");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod charset;
pub mod client;
mod cloudfiles;
mod config;
mod error;
mod file;
mod filesystem;
mod memory;
pub mod mime;
pub mod path;
pub mod presign;
pub mod registry;
mod s3;
mod storage;
mod url;

pub use backend::{BackendKind, Content, FileMeta, Folder, StorageBackend};
pub use charset::NameCharset;
pub use client::{ClientError, ClientResult, ContainerConnector, ObjectStoreConnector};
pub use cloudfiles::CloudFilesStorage;
pub use config::{CloudFilesConfig, FileSystemConfig, MemoryConfig, S3Config, Settings, KNOWN_KEYS};
pub use error::{BoxedSource, ErrorKind, StorageError, StorageResult};
pub use file::{FileState, OpenMode, StorageFile, Whence};
pub use filesystem::FileSystemStorage;
pub use memory::{MemoryStorage, SharedMemoryStore};
pub use path::MAX_NAME_ATTEMPTS;
pub use registry::{Collaborators, Registry};
pub use s3::S3Storage;
pub use storage::{SaveOptions, Storage};
pub use url::{StaticUrlBuilder, UrlBuilder};
