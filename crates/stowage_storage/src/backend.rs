//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};
use crate::path;
use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::SystemTime;

/// Content handed to a save.
///
/// Either a borrowed buffer or a reader positioned at the start of the data.
pub enum Content<'a> {
    /// An in-memory buffer.
    Bytes(&'a [u8]),
    /// A stream read to exhaustion.
    Reader(&'a mut dyn Read),
}

impl<'a> Content<'a> {
    /// Wraps a reader.
    pub fn reader<R: Read>(reader: &'a mut R) -> Self {
        Content::Reader(reader)
    }

    /// Collects the content into an owned buffer.
    ///
    /// # Errors
    ///
    /// Returns the reader's I/O error.
    pub fn into_vec(self) -> io::Result<Vec<u8>> {
        match self {
            Content::Bytes(bytes) => Ok(bytes.to_vec()),
            Content::Reader(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for Content<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Content::Reader(_) => f.write_str("Reader"),
        }
    }
}

impl<'a> From<&'a [u8]> for Content<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Content::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Content<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Content::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Content<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Content::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Content<'a> {
    fn from(text: &'a str) -> Self {
        Content::Bytes(text.as_bytes())
    }
}

impl<'a> From<&'a String> for Content<'a> {
    fn from(text: &'a String) -> Self {
        Content::Bytes(text.as_bytes())
    }
}

/// Metadata fetched when a file handle materializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the medium tracks one.
    pub last_modified: Option<SystemTime>,
    /// Stored content type, when the medium records one.
    pub content_type: Option<String>,
}

/// Which medium a backend stores into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Local directory.
    FileSystem,
    /// S3-compatible bucket.
    S3,
    /// CloudFiles-style container.
    CloudFiles,
    /// Process-local memory.
    Memory,
}

impl BackendKind {
    /// Lowercase label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            BackendKind::FileSystem => "filesystem",
            BackendKind::S3 => "s3",
            BackendKind::CloudFiles => "cloudfiles",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A created folder, bucket or container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Name of the folder as the medium knows it.
    pub name: String,
    /// The backend that owns it.
    pub backend: BackendKind,
}

/// A storage medium behind the [`Storage`](crate::Storage) facade.
///
/// Backends receive names that the facade has already confined with
/// [`StorageBackend::resolve`], and confine them again against their own
/// root before touching the medium. Every native error is classified into
/// [`StorageError`] before it leaves a method.
///
/// # Invariants
///
/// - `store` followed by `read_at(name, 0, None)` returns the stored bytes
/// - `exists` reports `true` exactly for names `store` has written and
///   `delete` has not removed
/// - `delete` of an absent name fails with `NotFound`
/// - backends must be `Send + Sync`; connection state is memoized internally
///
/// # Implementors
///
/// - [`crate::FileSystemStorage`]
/// - [`crate::S3Storage`]
/// - [`crate::CloudFilesStorage`]
/// - [`crate::MemoryStorage`]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// The medium this backend stores into.
    fn kind(&self) -> BackendKind;

    /// Identifier of the root location; equal roots mean equal storages.
    fn root_id(&self) -> String;

    /// Confines `name` to the logical root, returning the canonical name.
    ///
    /// # Errors
    ///
    /// `SecurityViolation` if the name escapes the root, `InvalidArgument`
    /// if the backend cannot represent it.
    fn resolve(&self, name: &str) -> StorageResult<String> {
        path::confine("", name)
    }

    /// Whether saves should replace existing content instead of picking a
    /// free name.
    fn file_overwrite(&self) -> bool {
        false
    }

    /// Writes `content` under `name`, replacing any existing content.
    fn store(&self, name: &str, content: Content<'_>) -> StorageResult<()>;

    /// Returns whether `name` exists.
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Removes `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    fn delete(&self, name: &str) -> StorageResult<()>;

    /// Fetches size and metadata for `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    fn stat(&self, name: &str) -> StorageResult<FileMeta>;

    /// Reads up to `len` bytes of `name` starting at `offset`, or to the end
    /// when `len` is `None`.
    fn read_at(&self, name: &str, offset: u64, len: Option<u64>) -> StorageResult<Vec<u8>>;

    /// Returns a URL under which `name` can be downloaded.
    fn url(&self, name: &str) -> StorageResult<String>;

    /// Returns a local filesystem path for `name`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on backends without local paths.
    fn path(&self, name: &str) -> StorageResult<PathBuf> {
        let _ = name;
        Err(StorageError::invalid_argument(format!(
            "the {} backend doesn't support absolute paths",
            self.kind()
        )))
    }

    /// Creates a folder (directory, bucket or container); `None` means the
    /// backend's own root.
    ///
    /// # Errors
    ///
    /// `Conflict` if it already exists.
    fn create_folder(&self, name: Option<&str>) -> StorageResult<Folder>;

    /// Deletes a folder and everything in it; `None` means the root.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    fn delete_folder(&self, name: Option<&str>) -> StorageResult<()>;

    /// Lists the file names directly under the root.
    fn list_files(&self) -> StorageResult<Vec<String>>;

    /// Lists folder names (subdirectories, buckets or containers).
    fn list_folders(&self) -> StorageResult<Vec<String>>;

    /// Moves `from` to `to`.
    ///
    /// The default copies the content and deletes the source.
    ///
    /// # Errors
    ///
    /// `NotFound` if `from` is missing, `Conflict` if `to` exists.
    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        if self.exists(to)? {
            return Err(StorageError::conflict(to));
        }
        let data = self.read_at(from, 0, None)?;
        self.store(to, Content::Bytes(&data))?;
        self.delete(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_conversions() {
        let owned = String::from("abc");
        let vec = vec![1u8, 2, 3];
        assert!(matches!(Content::from("x"), Content::Bytes(b"x")));
        assert!(matches!(Content::from(&owned), Content::Bytes(b"abc")));
        assert!(matches!(Content::from(&vec), Content::Bytes(&[1, 2, 3])));
        assert!(matches!(Content::from(b"raw"), Content::Bytes(b"raw")));
    }

    #[test]
    fn reader_content_is_collected() {
        let mut cursor = io::Cursor::new(b"streamed".to_vec());
        let content = Content::reader(&mut cursor);
        assert_eq!(format!("{content:?}"), "Reader");
        assert_eq!(content.into_vec().unwrap(), b"streamed");
    }

    #[test]
    fn backend_kind_labels() {
        assert_eq!(BackendKind::FileSystem.to_string(), "filesystem");
        assert_eq!(BackendKind::Memory.as_str(), "memory");
    }
}
