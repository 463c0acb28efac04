//! The storage facade callers hold.

use crate::backend::{BackendKind, Content, Folder, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::file::{OpenMode, StorageFile};
use crate::path;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Options for [`Storage::save_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Replace existing content instead of picking a free name.
    pub overwrite: bool,
    /// Folder joined in front of the file name.
    pub folder: Option<String>,
    /// Keep the final segment as given instead of sanitizing it.
    pub raw_name: bool,
}

impl SaveOptions {
    /// Default options: sanitize, never clobber.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace existing content.
    #[must_use]
    pub const fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Save into `folder`.
    #[must_use]
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Skip file name sanitizing.
    #[must_use]
    pub const fn raw_name(mut self) -> Self {
        self.raw_name = true;
        self
    }
}

/// A configured file storage.
///
/// Cloning is cheap and clones share the backend, including any memoized
/// connection. Two storages are equal when they point at the same root.
///
/// # Example
///
/// ```rust
/// use stowage_storage::{MemoryStorage, OpenMode, SharedMemoryStore, Storage};
///
/// let storage = Storage::new(MemoryStorage::with_store("docs", SharedMemoryStore::new()));
/// let first = storage.save("report.txt", "v1").unwrap();
/// let second = storage.save("report.txt", "v2").unwrap();
/// assert_eq!(first.name(), Some("report.txt"));
/// assert_eq!(second.name(), Some("report_1.txt"));
///
/// let mut file = storage.open("report_1.txt", OpenMode::Read).unwrap();
/// assert_eq!(file.read(None).unwrap(), b"v2");
/// ```
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
}

impl Storage {
    /// Wraps a backend.
    pub fn new<B: StorageBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wraps an already shared backend.
    pub fn from_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// The medium behind this storage.
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Identifier of the root location.
    pub fn root_id(&self) -> String {
        self.backend.root_id()
    }

    /// Saves `content` under `name`, avoiding collisions.
    ///
    /// The last segment of `name` is sanitized, the whole name confined to
    /// the root, and a `_N` suffix added if the name is taken. The returned
    /// handle carries the name actually used.
    ///
    /// # Errors
    ///
    /// - `SecurityViolation` if the name escapes the root
    /// - `InvalidArgument` if nothing is left of the name after sanitizing
    /// - `ResourceExhausted` if no free name was found
    pub fn save<'a>(&self, name: &str, content: impl Into<Content<'a>>) -> StorageResult<StorageFile> {
        self.save_with(name, content, &SaveOptions::default())
    }

    /// [`Storage::save`] with explicit options.
    pub fn save_with<'a>(
        &self,
        name: &str,
        content: impl Into<Content<'a>>,
        options: &SaveOptions,
    ) -> StorageResult<StorageFile> {
        let requested = self.prepare_name(name, options)?;
        let final_name = if options.overwrite || self.backend.file_overwrite() {
            requested
        } else {
            self.get_available_name(&requested)?
        };

        self.backend.store(&final_name, content.into())?;
        tracing::info!(backend = %self.kind(), name = %final_name, "saved file");
        Ok(StorageFile::bound(
            Arc::downgrade(&self.backend),
            final_name,
            OpenMode::Read,
        ))
    }

    /// Opens a lazy handle to `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` in read mode if the file does not exist.
    pub fn open(&self, name: &str, mode: OpenMode) -> StorageResult<StorageFile> {
        let name = self.backend.resolve(name)?;
        if mode == OpenMode::Read && !self.backend.exists(&name)? {
            return Err(StorageError::not_found(name));
        }
        Ok(StorageFile::bound(Arc::downgrade(&self.backend), name, mode))
    }

    /// Deletes `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub fn delete(&self, name: &str) -> StorageResult<()> {
        let name = self.backend.resolve(name)?;
        self.backend.delete(&name)?;
        tracing::info!(backend = %self.kind(), name = %name, "deleted file");
        Ok(())
    }

    /// Returns whether `name` exists.
    pub fn exists(&self, name: &str) -> StorageResult<bool> {
        let name = self.backend.resolve(name)?;
        self.backend.exists(&name)
    }

    /// Download URL for `name`. Does not check that the file exists.
    pub fn url(&self, name: &str) -> StorageResult<String> {
        let name = self.backend.resolve(name)?;
        self.backend.url(&name)
    }

    /// Absolute local path of `name`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on backends without local paths.
    pub fn path(&self, name: &str) -> StorageResult<PathBuf> {
        let name = self.backend.resolve(name)?;
        self.backend.path(&name)
    }

    /// Creates a folder; `None` creates the root itself.
    pub fn create_folder(&self, name: Option<&str>) -> StorageResult<Folder> {
        let folder = self.backend.create_folder(name)?;
        tracing::info!(backend = %self.kind(), folder = %folder.name, "created folder");
        Ok(folder)
    }

    /// Deletes a folder and its contents; `None` deletes the root.
    pub fn delete_folder(&self, name: Option<&str>) -> StorageResult<()> {
        self.backend.delete_folder(name)?;
        tracing::info!(backend = %self.kind(), folder = ?name, "deleted folder");
        Ok(())
    }

    /// File names directly under the root.
    pub fn list_files(&self) -> StorageResult<Vec<String>> {
        self.backend.list_files()
    }

    /// Folder names: subdirectories, buckets or containers.
    pub fn list_folders(&self) -> StorageResult<Vec<String>> {
        self.backend.list_folders()
    }

    /// An unnamed handle in write mode; `prefix` is prepended to the name
    /// once it is set.
    pub fn new_file(&self, prefix: &str) -> StorageFile {
        StorageFile::unbound(Arc::downgrade(&self.backend), prefix, OpenMode::Write)
    }

    /// Moves `from` to `to`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `from` is missing, `Conflict` if `to` exists.
    pub fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = self.backend.resolve(from)?;
        let to = self.backend.resolve(to)?;
        self.backend.rename(&from, &to)?;
        tracing::info!(backend = %self.kind(), from = %from, to = %to, "renamed file");
        Ok(())
    }

    /// A name based on `name` that is currently free.
    pub fn get_available_name(&self, name: &str) -> StorageResult<String> {
        let name = self.backend.resolve(name)?;
        let available = path::get_available_name(|candidate| self.backend.exists(candidate), &name)?;
        tracing::debug!(requested = %name, chosen = %available, "resolved available name");
        Ok(available)
    }

    fn prepare_name(&self, name: &str, options: &SaveOptions) -> StorageResult<String> {
        let cleaned = path::clean(name);
        let (dir, file_name) = path::split_dir(&cleaned);
        let file_name = if options.raw_name {
            file_name.to_string()
        } else {
            path::secure_filename(file_name)
        };
        if file_name.is_empty() {
            return Err(StorageError::invalid_argument(format!(
                "{name:?} has no usable file name"
            )));
        }

        let dir = match &options.folder {
            Some(folder) => path::join(&path::clean(folder), dir),
            None => dir.to_string(),
        };
        self.backend.resolve(&path::join(&dir, &file_name))
    }
}

impl PartialEq for Storage {
    fn eq(&self, other: &Self) -> bool {
        self.root_id() == other.root_id()
    }
}

impl Eq for Storage {}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{MemoryStorage, SharedMemoryStore};

    fn storage(label: &str) -> Storage {
        Storage::new(MemoryStorage::with_store(label, SharedMemoryStore::new()))
    }

    #[test]
    fn collisions_get_suffixes() {
        let storage = storage("t");
        let names: Vec<_> = (0..3)
            .map(|_| storage.save("a.txt", "x").unwrap().name().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.txt", "a_1.txt", "a_2.txt"]);
    }

    #[test]
    fn overwrite_replaces() {
        let storage = storage("t");
        storage.save("a.txt", "one").unwrap();
        let mut file = storage
            .save_with("a.txt", "two", &SaveOptions::new().overwrite())
            .unwrap();
        assert_eq!(file.name(), Some("a.txt"));
        assert_eq!(file.read(None).unwrap(), b"two");
    }

    #[test]
    fn names_are_sanitized_per_segment() {
        let storage = storage("t");
        let file = storage.save("photos/My cool pic.png", "x").unwrap();
        assert_eq!(file.name(), Some("photos/My_cool_pic.png"));

        let file = storage
            .save_with("My cool pic.png", "x", &SaveOptions::new().raw_name())
            .unwrap();
        assert_eq!(file.name(), Some("My cool pic.png"));
    }

    #[test]
    fn folder_option_is_joined() {
        let storage = storage("t");
        let file = storage
            .save_with("a.txt", "x", &SaveOptions::new().folder("inbox/2024"))
            .unwrap();
        assert_eq!(file.name(), Some("inbox/2024/a.txt"));
    }

    #[test]
    fn traversal_is_rejected() {
        let storage = storage("t");
        let err = storage.save("../../etc/passwd", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
        assert_eq!(storage.exists("../x").unwrap_err().kind(), ErrorKind::SecurityViolation);
        assert!(storage.list_files().unwrap().is_empty());
    }

    #[test]
    fn empty_sanitized_name_is_invalid() {
        let storage = storage("t");
        let err = storage.save("...", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn open_missing_is_not_found_in_read_mode_only() {
        let storage = storage("t");
        assert_eq!(
            storage.open("nope.txt", OpenMode::Read).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(storage.open("nope.txt", OpenMode::Write).is_ok());
    }

    #[test]
    fn equality_follows_root() {
        let store = SharedMemoryStore::new();
        let a = Storage::new(MemoryStorage::with_store("x", store.clone()));
        let b = Storage::new(MemoryStorage::with_store("x", store.clone()));
        let c = Storage::new(MemoryStorage::with_store("y", store));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn new_file_then_write() {
        let storage = storage("t");
        let mut file = storage.new_file("drafts/");
        file.set_name("note.txt").unwrap();
        file.write_all("hi").unwrap();
        assert!(storage.exists("drafts/note.txt").unwrap());
    }
}
