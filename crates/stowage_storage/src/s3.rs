//! S3-style object store backend.
//!
//! The backend talks to the store through an [`ObjectStoreConnector`] supplied
//! by the host. Both the connection and the bucket handle are established on
//! first use and memoized; a failed attempt is not memoized, so the next call
//! retries.

use crate::backend::{BackendKind, Content, FileMeta, Folder, StorageBackend};
use crate::client::{
    BucketInfo, ClientError, ConnectOptions, ObjectInfo, ObjectStoreClient, ObjectStoreConnector,
    PresignRequest, PutOptions,
};
use crate::config::S3Config;
use crate::error::{StorageError, StorageResult};
use crate::mime;
use crate::path;
use crate::presign::percent_encode;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Stores files as objects in one bucket.
///
/// Names are confined under the configured `location` key prefix and encoded
/// in the configured charset before they become keys.
pub struct S3Storage {
    config: S3Config,
    bucket_name: String,
    connector: Arc<dyn ObjectStoreConnector>,
    connection: Mutex<Option<Arc<dyn ObjectStoreClient>>>,
    bucket: Mutex<Option<BucketInfo>>,
    index: Mutex<Option<BTreeMap<Vec<u8>, ObjectInfo>>>,
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket_name)
            .field("config", &self.config)
            .field("connected", &self.connection.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl S3Storage {
    /// Creates a storage for the configured bucket. No connection is made.
    ///
    /// # Errors
    ///
    /// `Unavailable` if no bucket name is configured.
    pub fn new(mut config: S3Config, connector: Arc<dyn ObjectStoreConnector>) -> StorageResult<Self> {
        config.location = path::clean(&config.location);
        let bucket_name = config.bucket_name.clone().ok_or_else(|| {
            StorageError::unavailable("no bucket configured (set AWS_STORAGE_BUCKET_NAME)")
        })?;
        Ok(Self {
            config,
            bucket_name,
            connector,
            connection: Mutex::new(None),
            bucket: Mutex::new(None),
            index: Mutex::new(None),
        })
    }

    /// The bucket this storage writes into.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// The configuration in effect.
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// The memoized client, connecting on first use.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the connector fails.
    pub fn connection(&self) -> StorageResult<Arc<dyn ObjectStoreClient>> {
        let mut guard = self.connection.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }

        let options = ConnectOptions {
            access_key: self.config.access_key.clone(),
            secret_key: self.config.secret_key.clone(),
            calling_format: self.config.calling_format,
            timeout: self.config.timeout,
        };
        let client = self.connector.connect(&options).map_err(|e| {
            StorageError::unavailable(format!("could not connect to object store: {e}"))
        })?;
        debug!(bucket = %self.bucket_name, "object store connection established");
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    /// The client, after making sure the bucket is usable.
    fn bucket_client(&self) -> StorageResult<Arc<dyn ObjectStoreClient>> {
        let client = self.connection()?;
        let mut guard = self.bucket.lock();
        if guard.is_none() {
            *guard = Some(self.open_bucket(client.as_ref())?);
        }
        Ok(client)
    }

    fn open_bucket(&self, client: &dyn ObjectStoreClient) -> StorageResult<BucketInfo> {
        match client.get_bucket(&self.bucket_name, self.config.auto_create_bucket) {
            Ok(bucket) => Ok(bucket),
            Err(e) if e.status == Some(404) => {
                if !self.config.auto_create_bucket {
                    return Err(self.missing_bucket());
                }
                let bucket = client
                    .create_bucket(&self.bucket_name)
                    .map_err(|e| StorageError::from_client(e, &self.bucket_name))?;
                client
                    .set_bucket_acl(&self.bucket_name, self.config.effective_bucket_acl())
                    .map_err(|e| StorageError::from_client(e, &self.bucket_name))?;
                info!(bucket = %self.bucket_name, "created bucket");
                Ok(bucket)
            }
            Err(e) => Err(StorageError::from_client(e, &self.bucket_name)),
        }
    }

    fn missing_bucket(&self) -> StorageError {
        StorageError::unavailable(format!(
            "bucket {} does not exist; create it or set AWS_AUTO_CREATE_BUCKET",
            self.bucket_name
        ))
    }

    /// Classifies an error from an object-level request.
    ///
    /// Without validation the bucket is only known to be missing once an
    /// object request comes back with `NoSuchBucket`; that is a
    /// configuration problem, not a missing file.
    fn object_error(&self, err: ClientError, name: &str) -> StorageError {
        if err.is_no_such_bucket() {
            return self.missing_bucket();
        }
        StorageError::from_client(err, name)
    }

    fn location_prefix(&self) -> String {
        let location = &self.config.location;
        if location.is_empty() {
            String::new()
        } else {
            format!("{location}/")
        }
    }

    fn key(&self, name: &str) -> StorageResult<Vec<u8>> {
        let confined = path::confine(&self.config.location, name)?;
        self.config.file_name_charset.encode(&confined)
    }

    fn name_from_key(&self, key: &[u8]) -> StorageResult<String> {
        let decoded = self.config.file_name_charset.decode(key)?;
        let prefix = self.location_prefix();
        Ok(decoded
            .strip_prefix(&prefix)
            .map_or_else(|| decoded.clone(), str::to_string))
    }

    fn lookup(&self, client: &dyn ObjectStoreClient, key: &[u8], name: &str) -> StorageResult<Option<ObjectInfo>> {
        if !self.config.preload_metadata {
            return client
                .head_object(&self.bucket_name, key)
                .map_err(|e| self.object_error(e, name));
        }

        let mut guard = self.index.lock();
        if guard.is_none() {
            let prefix = self.config.file_name_charset.encode(&self.location_prefix())?;
            let objects = client
                .list_objects(&self.bucket_name, &prefix)
                .map_err(|e| self.object_error(e, &self.bucket_name))?;
            debug!(bucket = %self.bucket_name, entries = objects.len(), "preloaded bucket metadata");
            *guard = Some(objects.into_iter().map(|o| (o.key.clone(), o)).collect());
        }
        Ok(guard.as_ref().and_then(|index| index.get(key).cloned()))
    }

    fn update_index(&self, key: &[u8], entry: Option<ObjectInfo>) {
        if let Some(index) = self.index.lock().as_mut() {
            match entry {
                Some(info) => {
                    index.insert(key.to_vec(), info);
                }
                None => {
                    index.remove(key);
                }
            }
        }
    }

    fn forget_bucket(&self) {
        *self.bucket.lock() = None;
        *self.index.lock() = None;
    }
}

impl StorageBackend for S3Storage {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn root_id(&self) -> String {
        let location = &self.config.location;
        if location.is_empty() {
            self.bucket_name.clone()
        } else {
            format!("{}/{location}", self.bucket_name)
        }
    }

    fn resolve(&self, name: &str) -> StorageResult<String> {
        let name = path::confine("", name)?;
        self.key(&name)?;
        Ok(name)
    }

    fn file_overwrite(&self) -> bool {
        self.config.file_overwrite
    }

    fn store(&self, name: &str, content: Content<'_>) -> StorageResult<()> {
        let key = self.key(name)?;
        let body = content
            .into_vec()
            .map_err(|e| StorageError::from_io(e, name))?;
        let content_type = mime::guess_type_or_default(name).to_string();
        let options = PutOptions {
            content_type: content_type.clone(),
            acl: self.config.acl.clone(),
            headers: self.config.headers.clone(),
            reduced_redundancy: self.config.reduced_redundancy,
        };

        let client = self.bucket_client()?;
        client
            .put_object(&self.bucket_name, &key, &body, &options)
            .map_err(|e| self.object_error(e, name))?;
        debug!(bucket = %self.bucket_name, name = %name, size = body.len(), "uploaded object");

        self.update_index(
            &key,
            Some(ObjectInfo {
                key: key.clone(),
                size: body.len() as u64,
                last_modified: Some(std::time::SystemTime::now()),
                content_type: Some(content_type),
            }),
        );
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        let key = self.key(name)?;
        let client = self.bucket_client()?;
        Ok(self.lookup(client.as_ref(), &key, name)?.is_some())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let key = self.key(name)?;
        let client = self.bucket_client()?;
        if self.lookup(client.as_ref(), &key, name)?.is_none() {
            return Err(StorageError::not_found(name));
        }
        client
            .delete_object(&self.bucket_name, &key)
            .map_err(|e| self.object_error(e, name))?;
        self.update_index(&key, None);
        Ok(())
    }

    fn stat(&self, name: &str) -> StorageResult<FileMeta> {
        let key = self.key(name)?;
        let client = self.bucket_client()?;
        let info = self
            .lookup(client.as_ref(), &key, name)?
            .ok_or_else(|| StorageError::not_found(name))?;
        Ok(FileMeta {
            size: info.size,
            last_modified: info.last_modified,
            content_type: info.content_type,
        })
    }

    fn read_at(&self, name: &str, offset: u64, len: Option<u64>) -> StorageResult<Vec<u8>> {
        let key = self.key(name)?;
        let client = self.bucket_client()?;
        client
            .get_object_range(&self.bucket_name, &key, offset, len)
            .map_err(|e| self.object_error(e, name))
    }

    fn url(&self, name: &str) -> StorageResult<String> {
        let key = self.key(name)?;
        if let Some(domain) = &self.config.custom_domain {
            let scheme = if self.config.secure_urls { "https" } else { "http" };
            return Ok(format!("{scheme}://{domain}/{}", percent_encode(&key)));
        }

        let request = PresignRequest {
            bucket: self.bucket_name.clone(),
            key,
            method: "GET".to_string(),
            expires_in: self.config.querystring_expire,
            query_auth: self.config.querystring_auth,
            force_http: !self.config.secure_urls,
        };
        self.connection()?
            .generate_url(&request)
            .map_err(|e| StorageError::from_client(e, name))
    }

    fn create_folder(&self, name: Option<&str>) -> StorageResult<Folder> {
        let bucket = name.unwrap_or(&self.bucket_name);
        let client = self.connection()?;
        let created = client
            .create_bucket(bucket)
            .map_err(|e| StorageError::from_client(e, bucket))?;
        client
            .set_bucket_acl(bucket, self.config.effective_bucket_acl())
            .map_err(|e| StorageError::from_client(e, bucket))?;
        Ok(Folder {
            name: created.name,
            backend: BackendKind::S3,
        })
    }

    fn delete_folder(&self, name: Option<&str>) -> StorageResult<()> {
        let bucket = name.unwrap_or(&self.bucket_name);
        self.connection()?
            .delete_bucket(bucket)
            .map_err(|e| StorageError::from_client(e, bucket))?;
        if bucket == self.bucket_name {
            self.forget_bucket();
        }
        Ok(())
    }

    fn list_files(&self) -> StorageResult<Vec<String>> {
        let client = self.bucket_client()?;
        let prefix = self.config.file_name_charset.encode(&self.location_prefix())?;
        client
            .list_objects(&self.bucket_name, &prefix)
            .map_err(|e| self.object_error(e, &self.bucket_name))?
            .iter()
            .map(|object| self.name_from_key(&object.key))
            .collect()
    }

    fn list_folders(&self) -> StorageResult<Vec<String>> {
        self.connection()?
            .list_buckets()
            .map_err(|e| StorageError::from_client(e, &self.bucket_name))
    }
}
