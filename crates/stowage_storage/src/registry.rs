//! Driver registry: configuration in, storage out.
//!
//! A driver key names a backend constructor. `DEFAULT_FILE_STORAGE` picks
//! the driver, and `TESTING` forces the in-memory mock regardless of it.

use crate::client::{ContainerConnector, ObjectStoreConnector};
use crate::cloudfiles::CloudFilesStorage;
use crate::config::{CloudFilesConfig, FileSystemConfig, MemoryConfig, S3Config, Settings};
use crate::error::{StorageError, StorageResult};
use crate::filesystem::FileSystemStorage;
use crate::memory::{MemoryStorage, SharedMemoryStore};
use crate::s3::S3Storage;
use crate::storage::Storage;
use crate::url::{StaticUrlBuilder, UrlBuilder};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Key of the local filesystem driver.
pub const FILESYSTEM: &str = "filesystem";
/// Key of the S3 driver.
pub const AMAZON: &str = "amazon";
/// Key of the CloudFiles driver.
pub const CLOUDFILES: &str = "cloudfiles";
/// Key of the in-memory driver.
pub const MOCK: &str = "mock";

/// External collaborators handed to every driver constructor.
#[derive(Clone)]
pub struct Collaborators {
    /// Builds application URLs for the filesystem and CloudFiles backends.
    pub url_builder: Arc<dyn UrlBuilder>,
    /// Object store SDK; required by the `amazon` driver.
    pub object_store: Option<Arc<dyn ObjectStoreConnector>>,
    /// Container store SDK; required by the `cloudfiles` driver.
    pub container_store: Option<Arc<dyn ContainerConnector>>,
    /// Store used by the `mock` driver.
    pub memory_store: SharedMemoryStore,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            url_builder: Arc::new(StaticUrlBuilder::default()),
            object_store: None,
            container_store: None,
            memory_store: SharedMemoryStore::global(),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("url_builder", &self.url_builder)
            .field("object_store", &self.object_store.is_some())
            .field("container_store", &self.container_store.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Sets the URL builder.
    #[must_use]
    pub fn with_url_builder(mut self, builder: Arc<dyn UrlBuilder>) -> Self {
        self.url_builder = builder;
        self
    }

    /// Sets the object store connector.
    #[must_use]
    pub fn with_object_store(mut self, connector: Arc<dyn ObjectStoreConnector>) -> Self {
        self.object_store = Some(connector);
        self
    }

    /// Sets the container store connector.
    #[must_use]
    pub fn with_container_store(mut self, connector: Arc<dyn ContainerConnector>) -> Self {
        self.container_store = Some(connector);
        self
    }

    /// Sets the store the mock driver uses.
    #[must_use]
    pub fn with_memory_store(mut self, store: SharedMemoryStore) -> Self {
        self.memory_store = store;
        self
    }
}

/// Builds a storage from settings, collaborators and an optional folder
/// overriding the configured root.
pub type Constructor =
    Box<dyn Fn(&Settings, &Collaborators, Option<&str>) -> StorageResult<Storage> + Send + Sync>;

/// Maps driver keys to constructors.
///
/// # Example
///
/// ```rust
/// use stowage_storage::{registry::Registry, BackendKind, Settings};
///
/// let registry = Registry::default();
/// let settings = Settings::new().with("TESTING", true);
/// let storage = registry.build(&settings, None).unwrap();
/// assert_eq!(storage.kind(), BackendKind::Memory);
/// ```
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
    collaborators: Collaborators,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("drivers", &self.drivers())
            .field("collaborators", &self.collaborators)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Collaborators::default())
    }
}

impl Registry {
    /// A registry with the four built-in drivers.
    pub fn new(collaborators: Collaborators) -> Self {
        let mut registry = Self {
            constructors: BTreeMap::new(),
            collaborators,
        };
        registry.register(FILESYSTEM, build_filesystem);
        registry.register(AMAZON, build_s3);
        registry.register(CLOUDFILES, build_cloudfiles);
        registry.register(MOCK, build_memory);
        registry
    }

    /// Adds or replaces a driver.
    pub fn register<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&Settings, &Collaborators, Option<&str>) -> StorageResult<Storage> + Send + Sync + 'static,
    {
        self.constructors.insert(key.into(), Box::new(constructor));
    }

    /// Registered driver keys, sorted.
    pub fn drivers(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// The collaborators handed to constructors.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// The driver `settings` select.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a selection key has the wrong type.
    pub fn selected_driver(settings: &Settings) -> StorageResult<String> {
        if settings.get_bool("TESTING")?.unwrap_or(false) {
            return Ok(MOCK.to_string());
        }
        Ok(settings
            .get_str("DEFAULT_FILE_STORAGE")?
            .unwrap_or_else(|| FILESYSTEM.to_string()))
    }

    /// Builds the storage `settings` select.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an unknown driver key
    /// - `Unavailable` if the driver's collaborator or root is missing
    pub fn build(&self, settings: &Settings, folder: Option<&str>) -> StorageResult<Storage> {
        let driver = Self::selected_driver(settings)?;
        self.build_driver(&driver, settings, folder)
    }

    /// Builds the storage for an explicit driver key.
    pub fn build_driver(
        &self,
        driver: &str,
        settings: &Settings,
        folder: Option<&str>,
    ) -> StorageResult<Storage> {
        let constructor = self.constructors.get(driver).ok_or_else(|| {
            StorageError::invalid_argument(format!("unknown storage driver: {driver}"))
        })?;
        let storage = constructor(settings, &self.collaborators, folder)?;
        tracing::info!(driver = %driver, root = %storage.root_id(), "built storage");
        Ok(storage)
    }
}

fn build_filesystem(
    settings: &Settings,
    collaborators: &Collaborators,
    folder: Option<&str>,
) -> StorageResult<Storage> {
    let mut config = FileSystemConfig::from_settings(settings)?;
    if let Some(folder) = folder {
        config.folder = PathBuf::from(folder);
    }
    let backend = FileSystemStorage::new(&config, Arc::clone(&collaborators.url_builder))?;
    Ok(Storage::new(backend))
}

fn build_s3(
    settings: &Settings,
    collaborators: &Collaborators,
    folder: Option<&str>,
) -> StorageResult<Storage> {
    let connector = collaborators.object_store.clone().ok_or_else(|| {
        StorageError::unavailable("the amazon driver needs an object store connector")
    })?;
    let mut config = S3Config::from_settings(settings)?;
    if let Some(folder) = folder {
        config.bucket_name = Some(folder.to_string());
    }
    Ok(Storage::new(S3Storage::new(config, connector)?))
}

fn build_cloudfiles(
    settings: &Settings,
    collaborators: &Collaborators,
    folder: Option<&str>,
) -> StorageResult<Storage> {
    let connector = collaborators.container_store.clone().ok_or_else(|| {
        StorageError::unavailable("the cloudfiles driver needs a container store connector")
    })?;
    let mut config = CloudFilesConfig::from_settings(settings)?;
    if let Some(folder) = folder {
        config.container = Some(folder.to_string());
    }
    let backend = CloudFilesStorage::new(config, connector, Arc::clone(&collaborators.url_builder))?;
    Ok(Storage::new(backend))
}

fn build_memory(
    settings: &Settings,
    collaborators: &Collaborators,
    folder: Option<&str>,
) -> StorageResult<Storage> {
    let mut config = MemoryConfig::from_settings(settings)?;
    if let Some(folder) = folder {
        config.label = folder.to_string();
    }
    Ok(Storage::new(MemoryStorage::from_config(
        &config,
        collaborators.memory_store.clone(),
    )))
}
