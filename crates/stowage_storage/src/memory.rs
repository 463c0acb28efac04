//! In-memory storage backend for testing.

use crate::backend::{BackendKind, Content, FileMeta, Folder, StorageBackend};
use crate::config::MemoryConfig;
use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct MemoryEntry {
    content: Bytes,
    last_modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, MemoryEntry>,
    folders: BTreeSet<String>,
}

impl MemoryState {
    fn has_folder(&self, name: &str) -> bool {
        let prefix = format!("{name}/");
        self.folders.contains(name) || self.files.keys().any(|k| k.starts_with(&prefix))
    }
}

/// The map a [`MemoryStorage`] keeps its files in.
///
/// Clones share the same map. [`SharedMemoryStore::global`] is the
/// process-wide instance every storage uses unless given its own.
#[derive(Debug, Clone, Default)]
pub struct SharedMemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl SharedMemoryStore {
    /// Creates a fresh, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<SharedMemoryStore> = OnceLock::new();
        GLOBAL.get_or_init(SharedMemoryStore::new).clone()
    }

    /// Removes every file and folder.
    pub fn empty(&self) {
        let mut state = self.inner.write();
        state.files.clear();
        state.folders.clear();
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    /// True when no files are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().files.is_empty()
    }

    /// Content stored under `name`.
    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.inner.read().files.get(name).map(|e| e.content.clone())
    }

    /// Whether both handles share one map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A storage backend that keeps files in memory.
///
/// Intended for tests. Storages built with [`MemoryStorage::new`] all share
/// [`SharedMemoryStore::global`], so files saved through one are visible
/// through every other; call [`MemoryStorage::empty`] between tests or give
/// each test its own store with [`MemoryStorage::with_store`].
///
/// # Example
///
/// ```rust
/// use stowage_storage::{MemoryStorage, SharedMemoryStore, Storage};
///
/// let store = SharedMemoryStore::new();
/// let storage = Storage::new(MemoryStorage::with_store("mock", store.clone()));
/// storage.save("a.txt", "hello").unwrap();
/// assert_eq!(store.get("a.txt").unwrap(), "hello");
/// assert_eq!(storage.url("a.txt").unwrap(), "/uploads/a.txt");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    label: String,
    store: SharedMemoryStore,
}

impl MemoryStorage {
    /// A storage on the global store.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_store(label, SharedMemoryStore::global())
    }

    /// A storage on its own store.
    pub fn with_store(label: impl Into<String>, store: SharedMemoryStore) -> Self {
        Self {
            label: label.into(),
            store,
        }
    }

    /// Builds from configuration on `store`.
    pub fn from_config(config: &MemoryConfig, store: SharedMemoryStore) -> Self {
        Self::with_store(config.label.clone(), store)
    }

    /// The backing store.
    pub fn store(&self) -> &SharedMemoryStore {
        &self.store
    }

    /// Clears the backing store.
    pub fn empty(&self) {
        self.store.empty();
    }
}

impl StorageBackend for MemoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn root_id(&self) -> String {
        self.label.clone()
    }

    fn store(&self, name: &str, content: Content<'_>) -> StorageResult<()> {
        let content = content
            .into_vec()
            .map_err(|e| StorageError::from_io(e, name))?;
        let entry = MemoryEntry {
            content: Bytes::from(content),
            last_modified: SystemTime::now(),
        };
        self.store.inner.write().files.insert(name.to_string(), entry);
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.store.inner.read().files.contains_key(name))
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.store
            .inner
            .write()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(name))
    }

    fn stat(&self, name: &str) -> StorageResult<FileMeta> {
        let state = self.store.inner.read();
        let entry = state
            .files
            .get(name)
            .ok_or_else(|| StorageError::not_found(name))?;
        Ok(FileMeta {
            size: entry.content.len() as u64,
            last_modified: Some(entry.last_modified),
            content_type: None,
        })
    }

    fn read_at(&self, name: &str, offset: u64, len: Option<u64>) -> StorageResult<Vec<u8>> {
        let state = self.store.inner.read();
        let entry = state
            .files
            .get(name)
            .ok_or_else(|| StorageError::not_found(name))?;

        let size = entry.content.len();
        let start = usize::try_from(offset).unwrap_or(size).min(size);
        let end = match len {
            Some(len) => start.saturating_add(usize::try_from(len).unwrap_or(usize::MAX)).min(size),
            None => size,
        };
        Ok(entry.content.slice(start..end).to_vec())
    }

    fn url(&self, name: &str) -> StorageResult<String> {
        Ok(format!("/uploads/{name}"))
    }

    fn create_folder(&self, name: Option<&str>) -> StorageResult<Folder> {
        let folder = crate::path::confine("", name.unwrap_or(&self.label))?;
        let mut state = self.store.inner.write();
        if state.has_folder(&folder) {
            return Err(StorageError::conflict(folder));
        }
        state.folders.insert(folder.clone());
        Ok(Folder {
            name: folder,
            backend: BackendKind::Memory,
        })
    }

    fn delete_folder(&self, name: Option<&str>) -> StorageResult<()> {
        let folder = crate::path::confine("", name.unwrap_or(&self.label))?;
        let mut state = self.store.inner.write();
        if !state.has_folder(&folder) {
            return Err(StorageError::not_found(folder));
        }
        let prefix = format!("{folder}/");
        state.files.retain(|k, _| !k.starts_with(&prefix));
        state
            .folders
            .retain(|f| f != &folder && !f.starts_with(&prefix));
        Ok(())
    }

    fn list_files(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .store
            .inner
            .read()
            .files
            .keys()
            .filter(|k| !k.contains('/'))
            .cloned()
            .collect())
    }

    fn list_folders(&self) -> StorageResult<Vec<String>> {
        let state = self.store.inner.read();
        let mut folders: BTreeSet<String> = state
            .folders
            .iter()
            .map(|f| f.split('/').next().unwrap_or(f.as_str()).to_string())
            .collect();
        folders.extend(
            state
                .files
                .keys()
                .filter_map(|k| k.split_once('/').map(|(dir, _)| dir.to_string())),
        );
        Ok(folders.into_iter().collect())
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let mut state = self.store.inner.write();
        if state.files.contains_key(to) {
            return Err(StorageError::conflict(to));
        }
        let entry = state
            .files
            .remove(from)
            .ok_or_else(|| StorageError::not_found(from))?;
        state.files.insert(to.to_string(), entry);
        Ok(())
    }
}
