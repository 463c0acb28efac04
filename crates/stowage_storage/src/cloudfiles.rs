//! CloudFiles-style container backend.

use crate::backend::{BackendKind, Content, FileMeta, Folder, StorageBackend};
use crate::client::{ContainerClient, ContainerConnectOptions, ContainerConnector, ContainerInfo};
use crate::config::CloudFilesConfig;
use crate::error::{StorageError, StorageResult};
use crate::mime;
use crate::path;
use crate::url::UrlBuilder;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Stores files as objects in one public container.
///
/// The container is looked up on first use, created if configured to, and
/// published through the CDN if it is not public yet.
pub struct CloudFilesStorage {
    config: CloudFilesConfig,
    container_name: String,
    connector: Arc<dyn ContainerConnector>,
    urls: Arc<dyn UrlBuilder>,
    connection: Mutex<Option<Arc<dyn ContainerClient>>>,
    container: Mutex<Option<ContainerInfo>>,
}

impl fmt::Debug for CloudFilesStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudFilesStorage")
            .field("container", &self.container_name)
            .field("config", &self.config)
            .field("connected", &self.connection.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl CloudFilesStorage {
    /// Creates a storage for the configured container. No connection is made.
    ///
    /// # Errors
    ///
    /// `Unavailable` if no container is configured.
    pub fn new(
        config: CloudFilesConfig,
        connector: Arc<dyn ContainerConnector>,
        urls: Arc<dyn UrlBuilder>,
    ) -> StorageResult<Self> {
        let container_name = config.container.clone().ok_or_else(|| {
            StorageError::unavailable("no container configured (set CLOUDFILES_CONTAINER)")
        })?;
        Ok(Self {
            config,
            container_name,
            connector,
            urls,
            connection: Mutex::new(None),
            container: Mutex::new(None),
        })
    }

    /// The container this storage writes into.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// The memoized client, authenticating on first use.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the connector fails.
    pub fn connection(&self) -> StorageResult<Arc<dyn ContainerClient>> {
        let mut guard = self.connection.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }

        let options = ContainerConnectOptions {
            username: self.config.username.clone(),
            api_key: self.config.api_key.clone(),
            timeout: self.config.timeout,
            servicenet: self.config.servicenet,
        };
        let client = self.connector.connect(&options).map_err(|e| {
            StorageError::unavailable(format!("could not connect to container store: {e}"))
        })?;
        debug!(container = %self.container_name, "container store connection established");
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    /// The memoized container, public and ready for use.
    pub fn container(&self) -> StorageResult<ContainerInfo> {
        let client = self.connection()?;
        let mut guard = self.container.lock();
        if let Some(info) = guard.as_ref() {
            return Ok(info.clone());
        }

        let mut info = match client.get_container(&self.container_name) {
            Ok(info) => info,
            Err(e) if e.status == Some(404) => {
                if !self.config.auto_create_container {
                    return Err(StorageError::unavailable(format!(
                        "container {} does not exist; create it or set CLOUDFILES_AUTO_CREATE_CONTAINER",
                        self.container_name
                    )));
                }
                let created = client
                    .create_container(&self.container_name)
                    .map_err(|e| StorageError::from_client(e, &self.container_name))?;
                info!(container = %self.container_name, "created container");
                created
            }
            Err(e) => return Err(StorageError::from_client(e, &self.container_name)),
        };

        if !info.public {
            info = client
                .make_public(&self.container_name)
                .map_err(|e| StorageError::from_client(e, &self.container_name))?;
            info!(container = %self.container_name, "published container");
        }
        *guard = Some(info.clone());
        Ok(info)
    }

    /// Base URL objects in the container are served from.
    ///
    /// A static override wins; otherwise the TLS URI is used when configured
    /// or when the current request is secure.
    pub fn container_url(&self) -> StorageResult<String> {
        if let Some(uri) = self.config.container_uris.get(&self.container_name) {
            return Ok(uri.clone());
        }

        let info = self.container()?;
        let secure = self.config.secure_uris || self.urls.request_is_secure();
        let uri = if secure {
            info.public_ssl_uri
        } else {
            info.public_uri
        };
        uri.ok_or_else(|| {
            StorageError::unavailable(format!(
                "container {} has no public uri",
                self.container_name
            ))
        })
    }

    fn forget_container(&self) {
        *self.container.lock() = None;
    }
}

impl StorageBackend for CloudFilesStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudFiles
    }

    fn root_id(&self) -> String {
        self.container_name.clone()
    }

    fn store(&self, name: &str, content: Content<'_>) -> StorageResult<()> {
        let name = path::confine("", name)?;
        let body = content
            .into_vec()
            .map_err(|e| StorageError::from_io(e, &name))?;
        self.container()?;
        self.connection()?
            .put_object(&self.container_name, &name, &body, mime::guess_type(&name))
            .map_err(|e| StorageError::from_client(e, &name))?;
        debug!(container = %self.container_name, name = %name, size = body.len(), "uploaded object");
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        let name = path::confine("", name)?;
        self.container()?;
        match self.connection()?.get_object(&self.container_name, &name) {
            Ok(_) => Ok(true),
            Err(e) if e.status == Some(404) => Ok(false),
            Err(e) => Err(StorageError::from_client(e, &name)),
        }
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let name = path::confine("", name)?;
        self.container()?;
        self.connection()?
            .delete_object(&self.container_name, &name)
            .map_err(|e| StorageError::from_client(e, &name))
    }

    fn stat(&self, name: &str) -> StorageResult<FileMeta> {
        let name = path::confine("", name)?;
        self.container()?;
        let info = self
            .connection()?
            .get_object(&self.container_name, &name)
            .map_err(|e| StorageError::from_client(e, &name))?;
        Ok(FileMeta {
            size: info.size,
            last_modified: info.last_modified,
            content_type: info.content_type,
        })
    }

    fn read_at(&self, name: &str, offset: u64, len: Option<u64>) -> StorageResult<Vec<u8>> {
        let name = path::confine("", name)?;
        self.container()?;
        self.connection()?
            .read_object(&self.container_name, &name, offset, len)
            .map_err(|e| StorageError::from_client(e, &name))
    }

    fn url(&self, name: &str) -> StorageResult<String> {
        let name = path::confine("", name)?;
        Ok(format!("{}/{name}", self.container_url()?.trim_end_matches('/')))
    }

    fn create_folder(&self, name: Option<&str>) -> StorageResult<Folder> {
        let container = name.unwrap_or(&self.container_name);
        let client = self.connection()?;
        match client.get_container(container) {
            Ok(_) => Err(StorageError::conflict(container)),
            Err(e) if e.status == Some(404) => {
                let created = client
                    .create_container(container)
                    .map_err(|e| StorageError::from_client(e, container))?;
                Ok(Folder {
                    name: created.name,
                    backend: BackendKind::CloudFiles,
                })
            }
            Err(e) => Err(StorageError::from_client(e, container)),
        }
    }

    fn delete_folder(&self, name: Option<&str>) -> StorageResult<()> {
        let container = name.unwrap_or(&self.container_name);
        self.connection()?
            .delete_container(container)
            .map_err(|e| StorageError::from_client(e, container))?;
        if container == self.container_name {
            self.forget_container();
        }
        Ok(())
    }

    fn list_files(&self) -> StorageResult<Vec<String>> {
        self.container()?;
        self.connection()?
            .list_objects(&self.container_name)
            .map_err(|e| StorageError::from_client(e, &self.container_name))?
            .into_iter()
            .map(|object| {
                String::from_utf8(object.key).map_err(|e| {
                    StorageError::invalid_argument(format!("object name is not valid utf-8: {e}"))
                })
            })
            .collect()
    }

    fn list_folders(&self) -> StorageResult<Vec<String>> {
        self.connection()?
            .list_containers()
            .map_err(|e| StorageError::from_client(e, &self.container_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, ClientResult, ObjectInfo};
    use crate::error::ErrorKind;
    use crate::url::StaticUrlBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connector for a single container with no objects.
    #[derive(Default)]
    struct Stub {
        connects: AtomicUsize,
        exists: bool,
        public: bool,
        made_public: AtomicUsize,
    }

    struct StubConnector(Arc<Stub>);
    struct StubClient(Arc<Stub>);

    impl ContainerConnector for StubConnector {
        fn connect(&self, _options: &ContainerConnectOptions) -> ClientResult<Arc<dyn ContainerClient>> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubClient(Arc::clone(&self.0))))
        }
    }

    fn info(name: &str, public: bool) -> ContainerInfo {
        ContainerInfo {
            name: name.into(),
            public,
            public_uri: Some("http://cdn.example.com/c".into()),
            public_ssl_uri: Some("https://ssl.example.com/c".into()),
        }
    }

    impl ContainerClient for StubClient {
        fn get_container(&self, name: &str) -> ClientResult<ContainerInfo> {
            if self.0.exists {
                Ok(info(name, self.0.public))
            } else {
                Err(ClientError::not_found("no such container"))
            }
        }
        fn create_container(&self, name: &str) -> ClientResult<ContainerInfo> {
            Ok(info(name, false))
        }
        fn make_public(&self, name: &str) -> ClientResult<ContainerInfo> {
            self.0.made_public.fetch_add(1, Ordering::SeqCst);
            Ok(info(name, true))
        }
        fn delete_container(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
        fn list_containers(&self) -> ClientResult<Vec<String>> {
            Ok(vec!["c".into()])
        }
        fn put_object(&self, _: &str, _: &str, _: &[u8], _: Option<&str>) -> ClientResult<()> {
            Ok(())
        }
        fn get_object(&self, _container: &str, _name: &str) -> ClientResult<ObjectInfo> {
            Err(ClientError::not_found("no such object"))
        }
        fn read_object(&self, _: &str, _: &str, _: u64, _: Option<u64>) -> ClientResult<Vec<u8>> {
            Err(ClientError::not_found("no such object"))
        }
        fn delete_object(&self, _: &str, _: &str) -> ClientResult<()> {
            Err(ClientError::not_found("no such object"))
        }
        fn list_objects(&self, _: &str) -> ClientResult<Vec<ObjectInfo>> {
            Ok(Vec::new())
        }
    }

    fn storage(config: CloudFilesConfig, stub: Stub, secure_request: bool) -> (CloudFilesStorage, Arc<Stub>) {
        let stub = Arc::new(stub);
        let urls = Arc::new(StaticUrlBuilder::default().with_secure_requests(secure_request));
        let storage = CloudFilesStorage::new(config, Arc::new(StubConnector(Arc::clone(&stub))), urls).unwrap();
        (storage, stub)
    }

    fn existing(public: bool) -> Stub {
        Stub {
            exists: true,
            public,
            ..Stub::default()
        }
    }

    #[test]
    fn url_prefers_override_then_tls_then_plain() {
        let (plain, _) = storage(CloudFilesConfig::new("c"), existing(true), false);
        assert_eq!(plain.url("a.txt").unwrap(), "http://cdn.example.com/c/a.txt");

        let (secure_request, _) = storage(CloudFilesConfig::new("c"), existing(true), true);
        assert_eq!(secure_request.url("a.txt").unwrap(), "https://ssl.example.com/c/a.txt");

        let (secure_config, _) = storage(
            CloudFilesConfig::new("c").with_secure_uris(true),
            existing(true),
            false,
        );
        assert_eq!(secure_config.url("a.txt").unwrap(), "https://ssl.example.com/c/a.txt");

        let (overridden, stub) = storage(
            CloudFilesConfig::new("c").with_container_uri("c", "https://static.example.com/"),
            existing(true),
            true,
        );
        assert_eq!(overridden.url("a.txt").unwrap(), "https://static.example.com/a.txt");
        assert_eq!(stub.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn container_is_published_once() {
        let (storage, stub) = storage(CloudFilesConfig::new("c"), existing(false), false);
        storage.exists("a").unwrap();
        storage.exists("b").unwrap();
        assert_eq!(stub.made_public.load(Ordering::SeqCst), 1);
        assert_eq!(stub.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_container() {
        let (storage, _) = storage(CloudFilesConfig::new("c"), Stub::default(), false);
        assert_eq!(storage.exists("a").unwrap_err().kind(), ErrorKind::Unavailable);

        let config = CloudFilesConfig::new("c").with_auto_create_container(true);
        let (storage, stub) = self::storage(config, Stub::default(), false);
        assert!(!storage.exists("a").unwrap());
        assert_eq!(stub.made_public.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_objects_are_not_found() {
        let (storage, _) = storage(CloudFilesConfig::new("c"), existing(true), false);
        assert!(!storage.exists("a.txt").unwrap());
        assert_eq!(storage.delete("a.txt").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(storage.stat("a.txt").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn create_existing_container_conflicts() {
        let (storage, _) = storage(CloudFilesConfig::new("c"), existing(true), false);
        assert_eq!(storage.create_folder(None).unwrap_err().kind(), ErrorKind::Conflict);

        let (storage, _) = self::storage(CloudFilesConfig::new("c"), Stub::default(), false);
        assert_eq!(storage.create_folder(Some("new")).unwrap().name, "new");
    }

    #[test]
    fn missing_container_name_is_unavailable() {
        let err = CloudFilesStorage::new(
            CloudFilesConfig::default(),
            Arc::new(StubConnector(Arc::new(Stub::default()))),
            Arc::new(StaticUrlBuilder::default()),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
