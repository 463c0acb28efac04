//! Local filesystem storage backend.

use crate::backend::{BackendKind, Content, FileMeta, Folder, StorageBackend};
use crate::config::FileSystemConfig;
use crate::error::{ErrorKind, StorageError, StorageResult};
use crate::mime;
use crate::path;
use crate::url::{StaticUrlBuilder, UrlBuilder};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Buffer size used when copying streamed content to disk.
const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Stores files in a local directory.
///
/// Every name is confined to the root directory before it reaches the OS.
/// Native file handles are opened per call and closed before returning.
///
/// # Example
///
/// ```rust,no_run
/// use stowage_storage::{FileSystemStorage, Storage};
///
/// let storage = Storage::new(FileSystemStorage::with_root("/srv/uploads").unwrap());
/// let file = storage.save("greeting.txt", "hello").unwrap();
/// println!("{}", file.path().unwrap().display());
/// ```
#[derive(Debug)]
pub struct FileSystemStorage {
    root: PathBuf,
    root_str: String,
    file_view: String,
    urls: Arc<dyn UrlBuilder>,
}

impl FileSystemStorage {
    /// Creates a storage from configuration.
    ///
    /// A relative root is made absolute against the current directory. The
    /// directory itself is not created; see
    /// [`Storage::create_folder`](crate::Storage::create_folder).
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new(config: &FileSystemConfig, urls: Arc<dyn UrlBuilder>) -> StorageResult<Self> {
        let absolute = if config.folder.is_absolute() {
            config.folder.clone()
        } else {
            std::env::current_dir()
                .map_err(|e| StorageError::from_io(e, &config.folder.to_string_lossy()))?
                .join(&config.folder)
        };

        let root_str = normalize_root(&absolute);
        Ok(Self {
            root: PathBuf::from(&root_str),
            root_str,
            file_view: config.file_view.clone(),
            urls,
        })
    }

    /// Creates a storage rooted at `folder` with default settings.
    pub fn with_root(folder: impl Into<PathBuf>) -> StorageResult<Self> {
        Self::new(
            &FileSystemConfig::new(folder),
            Arc::new(StaticUrlBuilder::default()),
        )
    }

    /// The absolute root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, name: &str) -> StorageResult<PathBuf> {
        Ok(PathBuf::from(path::confine(&self.root_str, name)?))
    }

    fn folder_path(&self, name: Option<&str>) -> StorageResult<PathBuf> {
        match name {
            Some(name) => self.full_path(name),
            None => Ok(self.root.clone()),
        }
    }

    fn ensure_parent(&self, full: &Path, name: &str) -> StorageResult<()> {
        let Some(parent) = full.parent() else {
            return Ok(());
        };
        match fs::create_dir_all(parent) {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = StorageError::from_io(e, name);
                // Another writer may have created it concurrently.
                if err.kind() == ErrorKind::Conflict && parent.is_dir() {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn list_entries(&self, want_dirs: bool) -> StorageResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::from_io(e, &self.root_str))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_io(e, &self.root_str))?;
            let file_type = entry
                .file_type()
                .map_err(|e| StorageError::from_io(e, &self.root_str))?;
            if file_type.is_dir() == want_dirs {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn normalize_root(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let cleaned = path::clean(&text);
    if text.starts_with('/') {
        format!("/{cleaned}")
    } else {
        cleaned
    }
}

impl StorageBackend for FileSystemStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::FileSystem
    }

    fn root_id(&self) -> String {
        self.root_str.clone()
    }

    fn store(&self, name: &str, content: Content<'_>) -> StorageResult<()> {
        let full = self.full_path(name)?;
        self.ensure_parent(&full, name)?;

        let mut dest = File::create(&full).map_err(|e| StorageError::from_io(e, name))?;
        match content {
            Content::Bytes(bytes) => dest.write_all(bytes),
            Content::Reader(reader) => {
                let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, reader);
                io::copy(&mut reader, &mut dest).map(|_| ())
            }
        }
        .map_err(|e| StorageError::from_io(e, name))?;
        dest.flush().map_err(|e| StorageError::from_io(e, name))
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.full_path(name)?.exists())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let full = self.full_path(name)?;
        fs::remove_file(full).map_err(|e| StorageError::from_io(e, name))
    }

    fn stat(&self, name: &str) -> StorageResult<FileMeta> {
        let full = self.full_path(name)?;
        let metadata = fs::metadata(full).map_err(|e| StorageError::from_io(e, name))?;
        Ok(FileMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok(),
            content_type: mime::guess_type(name).map(str::to_string),
        })
    }

    fn read_at(&self, name: &str, offset: u64, len: Option<u64>) -> StorageResult<Vec<u8>> {
        let full = self.full_path(name)?;
        let mut file = File::open(full).map_err(|e| StorageError::from_io(e, name))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::from_io(e, name))?;

        let mut buf = Vec::new();
        match len {
            Some(len) => file.take(len).read_to_end(&mut buf),
            None => file.read_to_end(&mut buf),
        }
        .map_err(|e| StorageError::from_io(e, name))?;
        Ok(buf)
    }

    fn url(&self, name: &str) -> StorageResult<String> {
        let name = path::confine("", name)?;
        Ok(self.urls.file_url(&self.file_view, &name))
    }

    fn path(&self, name: &str) -> StorageResult<PathBuf> {
        self.full_path(name)
    }

    fn create_folder(&self, name: Option<&str>) -> StorageResult<Folder> {
        let full = self.folder_path(name)?;
        let display = full.to_string_lossy().into_owned();
        if fs::symlink_metadata(&full).is_ok() {
            return Err(StorageError::conflict(display));
        }
        fs::create_dir_all(&full).map_err(|e| StorageError::from_io(e, &display))?;
        Ok(Folder {
            name: display,
            backend: BackendKind::FileSystem,
        })
    }

    fn delete_folder(&self, name: Option<&str>) -> StorageResult<()> {
        let full = self.folder_path(name)?;
        fs::remove_dir_all(&full).map_err(|e| StorageError::from_io(e, &full.to_string_lossy()))
    }

    fn list_files(&self) -> StorageResult<Vec<String>> {
        self.list_entries(false)
    }

    fn list_folders(&self) -> StorageResult<Vec<String>> {
        self.list_entries(true)
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let source = self.full_path(from)?;
        let target = self.full_path(to)?;
        if !source.exists() {
            return Err(StorageError::not_found(from));
        }
        if target.exists() {
            return Err(StorageError::conflict(to));
        }
        self.ensure_parent(&target, to)?;
        fs::rename(source, target).map_err(|e| StorageError::from_io(e, from))
    }
}
