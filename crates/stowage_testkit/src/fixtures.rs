//! Test fixtures and storage helpers.
//!
//! Provides ready-made storages for every backend, each isolated from the
//! others and from the process-wide memory store.

use crate::fakes::{FakeContainerStore, FakeObjectStore};
use std::path::Path;
use std::sync::{Arc, Once};
use stowage_storage::{
    CloudFilesConfig, CloudFilesStorage, FileSystemConfig, FileSystemStorage, MemoryStorage,
    S3Config, S3Storage, SharedMemoryStore, StaticUrlBuilder, Storage, UrlBuilder,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Bucket used by [`s3_storage`].
pub const TEST_BUCKET: &str = "stowage-test";

/// Container used by [`cloudfiles_storage`].
pub const TEST_CONTAINER: &str = "stowage-test";

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A filesystem storage in a temporary directory, removed on drop.
pub struct TempStorage {
    /// The storage instance.
    pub storage: Storage,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: TempDir,
}

impl TempStorage {
    /// Creates a storage rooted at a fresh temporary directory.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Creates a storage whose configuration is adjusted by `f`.
    pub fn with_config(f: impl FnOnce(FileSystemConfig) -> FileSystemConfig) -> Self {
        Self::with_urls(f, Arc::new(StaticUrlBuilder::default()))
    }

    /// Creates a storage with an adjusted configuration and its own URL
    /// builder.
    pub fn with_urls(
        f: impl FnOnce(FileSystemConfig) -> FileSystemConfig,
        urls: Arc<dyn UrlBuilder>,
    ) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = f(FileSystemConfig::new(dir.path()));
        let backend =
            FileSystemStorage::new(&config, urls).expect("Failed to create filesystem storage");
        Self {
            storage: Storage::new(backend),
            dir,
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempStorage {
    type Target = Storage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

/// A memory storage on its own store.
pub fn memory_storage() -> Storage {
    Storage::new(MemoryStorage::with_store("mock", SharedMemoryStore::new()))
}

/// An S3 storage over a fake store that already has [`TEST_BUCKET`].
pub fn s3_storage() -> (Storage, FakeObjectStore) {
    s3_storage_with(S3Config::new(TEST_BUCKET), FakeObjectStore::new().with_bucket(TEST_BUCKET))
}

/// An S3 storage over `fake` with an explicit configuration.
pub fn s3_storage_with(config: S3Config, fake: FakeObjectStore) -> (Storage, FakeObjectStore) {
    let backend = S3Storage::new(config, Arc::new(fake.clone())).expect("Failed to create S3 storage");
    (Storage::new(backend), fake)
}

/// A CloudFiles storage over a fake store that already has a public
/// [`TEST_CONTAINER`].
pub fn cloudfiles_storage() -> (Storage, FakeContainerStore) {
    cloudfiles_storage_with(
        CloudFilesConfig::new(TEST_CONTAINER),
        FakeContainerStore::new().with_container(TEST_CONTAINER, true),
        StaticUrlBuilder::default(),
    )
}

/// A CloudFiles storage over `fake` with an explicit configuration and URL
/// builder.
pub fn cloudfiles_storage_with(
    config: CloudFilesConfig,
    fake: FakeContainerStore,
    urls: StaticUrlBuilder,
) -> (Storage, FakeContainerStore) {
    let backend = CloudFilesStorage::new(config, Arc::new(fake.clone()), Arc::new(urls))
        .expect("Failed to create CloudFiles storage");
    (Storage::new(backend), fake)
}

/// One storage of each backend kind, plus whatever keeps it alive.
pub struct BackendFixture {
    /// Backend label for assertion messages.
    pub label: &'static str,
    /// The storage under test.
    pub storage: Storage,
    _guard: Option<TempDir>,
}

/// Builds one isolated storage per backend.
pub fn all_backends() -> Vec<BackendFixture> {
    let temp = TempStorage::new();
    let (s3, _) = s3_storage();
    let (cloudfiles, _) = cloudfiles_storage();

    vec![
        BackendFixture {
            label: "filesystem",
            storage: temp.storage,
            _guard: Some(temp.dir),
        },
        BackendFixture {
            label: "s3",
            storage: s3,
            _guard: None,
        },
        BackendFixture {
            label: "cloudfiles",
            storage: cloudfiles,
            _guard: None,
        },
        BackendFixture {
            label: "memory",
            storage: memory_storage(),
            _guard: None,
        },
    ]
}

/// Runs `f` against every backend.
///
/// # Example
///
/// ```rust
/// use stowage_testkit::for_each_backend;
///
/// for_each_backend(|label, storage| {
///     storage.save("a.txt", "x").unwrap();
///     assert!(storage.exists("a.txt").unwrap(), "{label}");
/// });
/// ```
pub fn for_each_backend<F>(mut f: F)
where
    F: FnMut(&str, &Storage),
{
    init_tracing();
    for fixture in all_backends() {
        f(fixture.label, &fixture.storage);
    }
}
