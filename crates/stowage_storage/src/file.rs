//! Lazy handles to stored files.

use crate::backend::{Content, FileMeta, StorageBackend};
use crate::error::{ErrorKind, StorageError, StorageResult};
use crate::mime;
use crate::path;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

/// How a handle was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Reading an existing file.
    #[default]
    Read,
    /// Writing; the file need not exist yet.
    Write,
}

/// Reference point for [`StorageFile::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file.
    Start,
    /// From the current cursor.
    Current,
    /// From the end of the file.
    End,
}

impl Whence {
    /// Converts the numeric `0`/`1`/`2` convention.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for any other value.
    pub fn from_raw(whence: i32) -> StorageResult<Self> {
        match whence {
            0 => Ok(Self::Start),
            1 => Ok(Self::Current),
            2 => Ok(Self::End),
            other => Err(StorageError::invalid_argument(format!(
                "invalid whence ({other}, should be 0, 1 or 2)"
            ))),
        }
    }
}

/// Where a handle is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// No name assigned yet.
    Unbound,
    /// Named, metadata not fetched.
    Bound,
    /// Metadata fetched from the backend.
    Materialized(FileMeta),
}

/// A handle to one named file in a [`Storage`](crate::Storage).
///
/// Handles are cheap: nothing is fetched until size, metadata or content is
/// first needed, and then `stat` runs once. The handle holds only a weak
/// reference to its backend; once every `Storage` clone is dropped the
/// delegated operations fail with `Unavailable`.
///
/// The name is write-once. Use [`StorageFile::rename`] to move the stored
/// content instead.
#[derive(Debug)]
pub struct StorageFile {
    storage: Weak<dyn StorageBackend>,
    prefix: String,
    name: Option<String>,
    mode: OpenMode,
    state: FileState,
    pos: u64,
}

impl StorageFile {
    pub(crate) fn unbound(storage: Weak<dyn StorageBackend>, prefix: &str, mode: OpenMode) -> Self {
        Self {
            storage,
            prefix: prefix.to_string(),
            name: None,
            mode,
            state: FileState::Unbound,
            pos: 0,
        }
    }

    pub(crate) fn bound(storage: Weak<dyn StorageBackend>, name: String, mode: OpenMode) -> Self {
        Self {
            storage,
            prefix: String::new(),
            name: Some(name),
            mode,
            state: FileState::Bound,
            pos: 0,
        }
    }

    /// The logical name, if one has been assigned.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Namespace prepended when the name is assigned.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The mode the handle was opened in.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &FileState {
        &self.state
    }

    /// True while no name has been assigned.
    pub fn is_null(&self) -> bool {
        self.name.is_none()
    }

    /// Assigns the name. `prefix` is prepended and the result confined.
    ///
    /// # Errors
    ///
    /// - `RenameViolation` if a name is already assigned
    /// - `SecurityViolation` if the name escapes the root
    pub fn set_name(&mut self, name: &str) -> StorageResult<()> {
        if let Some(current) = &self.name {
            return Err(StorageError::RenameViolation {
                current: current.clone(),
            });
        }
        let resolved = self.resolve_target(name)?;
        self.name = Some(resolved);
        self.state = FileState::Bound;
        self.pos = 0;
        Ok(())
    }

    /// Moves the stored content to `new_name` and rebinds the handle.
    ///
    /// On an unbound handle this only assigns the name, prefix included.
    /// Once bound, `new_name` is a full name like the one [`Self::name`]
    /// returns and the prefix is not applied again. If nothing has been
    /// stored yet the handle is rebound without touching the backend.
    ///
    /// # Errors
    ///
    /// `Conflict` if `new_name` is taken, plus any confinement error.
    pub fn rename(&mut self, new_name: &str) -> StorageResult<()> {
        let Some(current) = self.name.clone() else {
            return self.set_name(new_name);
        };
        let target = self.backend()?.resolve(&path::clean(new_name))?;
        if target == current {
            return Ok(());
        }

        let backend = self.backend()?;
        if backend.exists(&current)? {
            backend.rename(&current, &target)?;
            tracing::info!(from = %current, to = %target, "renamed file");
        }
        self.name = Some(target);
        self.state = FileState::Bound;
        self.pos = 0;
        Ok(())
    }

    /// Size in bytes; materializes the handle.
    pub fn size(&mut self) -> StorageResult<u64> {
        Ok(self.meta()?.size)
    }

    /// Last modification time, if the backend tracks one.
    pub fn last_modified(&mut self) -> StorageResult<Option<SystemTime>> {
        Ok(self.meta()?.last_modified)
    }

    /// Stored content type, falling back to a guess from the extension.
    pub fn content_type(&mut self) -> StorageResult<String> {
        let stored = self.meta()?.content_type.clone();
        match stored {
            Some(content_type) => Ok(content_type),
            None => Ok(mime::guess_type_or_default(self.bound_name()?).to_string()),
        }
    }

    /// Download URL for the file.
    pub fn url(&self) -> StorageResult<String> {
        self.backend()?.url(self.bound_name()?)
    }

    /// Local path of the file, on backends that have one.
    pub fn path(&self) -> StorageResult<PathBuf> {
        self.backend()?.path(self.bound_name()?)
    }

    /// Deletes the stored content. The handle stays bound to the name.
    pub fn delete(&mut self) -> StorageResult<()> {
        let backend = self.backend()?;
        let name = self.bound_name()?;
        backend.delete(name)?;
        tracing::info!(name = %name, "deleted file");
        self.state = FileState::Bound;
        self.pos = 0;
        Ok(())
    }

    /// Replaces the stored content.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless the handle was opened for writing and has a
    /// name.
    pub fn write_all<'a>(&mut self, content: impl Into<Content<'a>>) -> StorageResult<()> {
        if self.mode != OpenMode::Write {
            return Err(StorageError::invalid_argument(
                "file was not opened for writing",
            ));
        }
        let backend = self.backend()?;
        let name = self.bound_name()?;
        backend.store(name, content.into())?;
        tracing::info!(name = %name, "wrote file");
        self.state = FileState::Bound;
        self.pos = 0;
        Ok(())
    }

    /// Reads up to `size` bytes from the cursor, or to the end with `None`.
    ///
    /// Returns an empty vector at the end of the file.
    pub fn read(&mut self, size: Option<usize>) -> StorageResult<Vec<u8>> {
        let total = self.size()?;
        if self.pos >= total {
            return Ok(Vec::new());
        }

        let remaining = total - self.pos;
        let len = size.map_or(remaining, |n| remaining.min(n as u64));
        if len == 0 {
            return Ok(Vec::new());
        }

        let data = self.backend()?.read_at(self.bound_name()?, self.pos, Some(len))?;
        self.pos += data.len() as u64;
        Ok(data)
    }

    /// Moves the cursor and returns its new position.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the target is negative. Targets past the end are
    /// clamped to the size.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> StorageResult<u64> {
        let size = self.size()?;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => i128::from(self.pos),
            Whence::End => i128::from(size),
        };
        let target = base + i128::from(offset);
        if target < 0 {
            return Err(StorageError::invalid_argument(format!(
                "negative seek position {target}"
            )));
        }

        self.pos = u64::try_from(target).map_or(size, |t| t.min(size));
        Ok(self.pos)
    }

    /// [`StorageFile::seek`] with a numeric whence.
    pub fn seek_raw(&mut self, offset: i64, whence: i32) -> StorageResult<u64> {
        self.seek(offset, Whence::from_raw(whence)?)
    }

    /// Current cursor position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    fn backend(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        self.storage
            .upgrade()
            .ok_or_else(|| StorageError::unavailable("the storage behind this file has been dropped"))
    }

    fn bound_name(&self) -> StorageResult<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| StorageError::invalid_argument("file has no name"))
    }

    fn resolve_target(&self, name: &str) -> StorageResult<String> {
        let requested = format!("{}{}", self.prefix, path::clean(name));
        self.backend()?.resolve(&requested)
    }

    fn meta(&mut self) -> StorageResult<&FileMeta> {
        if !matches!(self.state, FileState::Materialized(_)) {
            let meta = self.backend()?.stat(self.bound_name()?)?;
            tracing::debug!(name = ?self.name, size = meta.size, "materialized file");
            self.state = FileState::Materialized(meta);
        }
        match &self.state {
            FileState::Materialized(meta) => Ok(meta),
            _ => Err(StorageError::invalid_argument("file has no name")),
        }
    }
}

impl io::Read for StorageFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = StorageFile::read(self, Some(buf.len())).map_err(into_io)?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl io::Seek for StorageFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range")
                })?;
                (offset, Whence::Start)
            }
            io::SeekFrom::Current(offset) => (offset, Whence::Current),
            io::SeekFrom::End(offset) => (offset, Whence::End),
        };
        StorageFile::seek(self, offset, whence).map_err(into_io)
    }
}

fn into_io(err: StorageError) -> io::Error {
    let kind = match err.kind() {
        ErrorKind::NotFound => io::ErrorKind::NotFound,
        ErrorKind::PermissionDenied => io::ErrorKind::PermissionDenied,
        ErrorKind::InvalidArgument | ErrorKind::SecurityViolation => io::ErrorKind::InvalidInput,
        ErrorKind::Conflict => io::ErrorKind::AlreadyExists,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStorage, SharedMemoryStore};
    use crate::Storage;
    use std::io::{Read, Seek, SeekFrom};

    fn storage() -> Storage {
        Storage::new(MemoryStorage::with_store("test", SharedMemoryStore::new()))
    }

    #[test]
    fn whence_from_raw() {
        assert_eq!(Whence::from_raw(0).unwrap(), Whence::Start);
        assert_eq!(Whence::from_raw(2).unwrap(), Whence::End);
        assert_eq!(Whence::from_raw(3).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn handle_is_lazy_until_size() {
        let storage = storage();
        storage.save("a.txt", "hello").unwrap();

        let mut file = storage.open("a.txt", OpenMode::Read).unwrap();
        assert_eq!(file.state(), &FileState::Bound);
        assert_eq!(file.size().unwrap(), 5);
        assert!(matches!(file.state(), FileState::Materialized(_)));
    }

    #[test]
    fn cursor_scenario() {
        let storage = storage();
        storage.save("n.txt", "123123").unwrap();
        let mut file = storage.open("n.txt", OpenMode::Read).unwrap();

        assert_eq!(file.read(Some(3)).unwrap(), b"123");
        assert_eq!(file.tell(), 3);
        file.seek(-3, Whence::Current).unwrap();
        assert_eq!(file.read(None).unwrap(), b"123123");
        assert_eq!(file.read(None).unwrap(), b"");

        file.seek(0, Whence::Start).unwrap();
        assert_eq!(file.read(Some(100)).unwrap(), b"123123");
    }

    #[test]
    fn seek_rejects_negative_and_clamps_past_end() {
        let storage = storage();
        storage.save("s.bin", &[0u8; 10]).unwrap();
        let mut file = storage.open("s.bin", OpenMode::Read).unwrap();

        let err = file.seek(-1, Whence::Start).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(file.seek(50, Whence::Start).unwrap(), 10);
        assert_eq!(file.seek(-4, Whence::End).unwrap(), 6);
        assert_eq!(file.seek_raw(2, 1).unwrap(), 8);
        assert!(file.seek_raw(0, 7).is_err());
    }

    #[test]
    fn name_is_write_once() {
        let storage = storage();
        let mut file = storage.new_file("pics/");
        assert!(file.is_null());

        file.set_name("cat.png").unwrap();
        assert_eq!(file.name(), Some("pics/cat.png"));

        let err = file.set_name("dog.png").unwrap_err();
        assert!(matches!(err, StorageError::RenameViolation { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn rename_moves_content() {
        let storage = storage();
        let mut file = storage.save("old.txt", "data").unwrap();
        file.rename("new.txt").unwrap();

        assert_eq!(file.name(), Some("new.txt"));
        assert!(!storage.exists("old.txt").unwrap());
        assert_eq!(file.read(None).unwrap(), b"data");
    }

    #[test]
    fn rename_takes_a_full_name_once_bound() {
        let storage = storage();
        let mut file = storage.new_file("pics/");
        file.rename("cat.png").unwrap();
        assert_eq!(file.name(), Some("pics/cat.png"));
        file.write_all("png").unwrap();

        file.rename("pics/dog.png").unwrap();
        assert_eq!(file.name(), Some("pics/dog.png"));
        assert!(storage.exists("pics/dog.png").unwrap());
        assert!(!storage.exists("pics/pics/dog.png").unwrap());
        assert!(!storage.exists("pics/cat.png").unwrap());

        file.rename("thumbs/dog.png").unwrap();
        assert_eq!(file.name(), Some("thumbs/dog.png"));
        assert_eq!(file.read(None).unwrap(), b"png");
    }

    #[test]
    fn write_requires_write_mode() {
        let storage = storage();
        storage.save("r.txt", "x").unwrap();

        let mut reader = storage.open("r.txt", OpenMode::Read).unwrap();
        assert_eq!(reader.write_all("y").unwrap_err().kind(), ErrorKind::InvalidArgument);

        let mut writer = storage.open("r.txt", OpenMode::Write).unwrap();
        writer.write_all("replaced").unwrap();
        assert_eq!(writer.read(None).unwrap(), b"replaced");
    }

    #[test]
    fn dropped_storage_is_unavailable() {
        let storage = storage();
        let mut file = storage.save("gone.txt", "x").unwrap();
        drop(storage);

        assert_eq!(file.size().unwrap_err().kind(), ErrorKind::Unavailable);
        assert_eq!(file.url().unwrap_err().kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn std_io_traits() {
        let storage = storage();
        let mut file = storage.save("io.txt", "hello world").unwrap();

        Seek::seek(&mut file, SeekFrom::Start(6)).unwrap();
        let mut out = String::new();
        Read::read_to_string(&mut file, &mut out).unwrap();
        assert_eq!(out, "world");

        let err = Seek::seek(&mut file, SeekFrom::End(-20)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn content_type_falls_back_to_guess() {
        let storage = storage();
        let mut file = storage.save("page.html", "<p>").unwrap();
        assert_eq!(file.content_type().unwrap(), "text/html");
    }
}
