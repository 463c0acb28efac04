//! In-process fakes for the cloud collaborators.
//!
//! [`FakeObjectStore`] and [`FakeContainerStore`] implement the connector and
//! client traits over plain maps, count the calls the backends make, and can
//! be told to refuse connections. Clones share state, so a test can keep one
//! handle for assertions while the storage owns another.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use stowage_storage::client::{
    BucketInfo, ClientError, ClientResult, ConnectOptions, ContainerClient,
    ContainerConnectOptions, ContainerConnector, ContainerInfo, ObjectInfo, ObjectStoreClient,
    ObjectStoreConnector, PresignRequest, PutOptions,
};
use stowage_storage::presign::QueryStringSigner;
use stowage_storage::UrlBuilder;

/// Host the fake object store signs URLs for.
pub const FAKE_S3_HOST: &str = "s3.fake.test";

/// One stored object as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeObject {
    /// Object body.
    pub data: Vec<u8>,
    /// Content type sent with the upload.
    pub content_type: Option<String>,
    /// Canned ACL sent with the upload.
    pub acl: Option<String>,
    /// Extra headers sent with the upload.
    pub headers: BTreeMap<String, String>,
    /// Whether reduced redundancy was requested.
    pub reduced_redundancy: bool,
    /// Upload time.
    pub last_modified: SystemTime,
}

impl FakeObject {
    fn info(&self, key: Vec<u8>) -> ObjectInfo {
        ObjectInfo {
            key,
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            content_type: self.content_type.clone(),
        }
    }

    fn range(&self, offset: u64, len: Option<u64>) -> Vec<u8> {
        let size = self.data.len();
        let start = usize::try_from(offset).unwrap_or(size).min(size);
        let end = len.map_or(size, |len| {
            start
                .saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
                .min(size)
        });
        self.data[start..end].to_vec()
    }
}

#[derive(Debug, Default)]
struct FakeBucket {
    acl: Option<String>,
    objects: BTreeMap<Vec<u8>, FakeObject>,
}

#[derive(Debug, Default)]
struct ObjectStoreState {
    buckets: BTreeMap<String, FakeBucket>,
    last_options: Option<ConnectOptions>,
}

#[derive(Debug, Default)]
struct ObjectStoreInner {
    state: Mutex<ObjectStoreState>,
    refuse_connections: AtomicBool,
    connects: AtomicUsize,
    heads: AtomicUsize,
    lists: AtomicUsize,
}

/// A fake S3-style object store.
#[derive(Debug, Clone, Default)]
pub struct FakeObjectStore {
    inner: Arc<ObjectStoreInner>,
}

impl FakeObjectStore {
    /// An empty store with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty bucket.
    #[must_use]
    pub fn with_bucket(self, name: &str) -> Self {
        self.inner
            .state
            .lock()
            .buckets
            .entry(name.to_string())
            .or_default();
        self
    }

    /// Makes every following connection attempt fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful and failed connection attempts.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of `head_object` calls.
    pub fn head_count(&self) -> usize {
        self.inner.heads.load(Ordering::SeqCst)
    }

    /// Number of `list_objects` calls.
    pub fn list_count(&self) -> usize {
        self.inner.lists.load(Ordering::SeqCst)
    }

    /// Options of the most recent connection attempt.
    pub fn last_connect_options(&self) -> Option<ConnectOptions> {
        self.inner.state.lock().last_options.clone()
    }

    /// Whether `bucket` exists.
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.inner.state.lock().buckets.contains_key(bucket)
    }

    /// ACL applied to `bucket`, if any.
    pub fn bucket_acl(&self, bucket: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.acl.clone())
    }

    /// The object stored under the raw `key`.
    pub fn object(&self, bucket: &str, key: &[u8]) -> Option<FakeObject> {
        self.inner
            .state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// Raw keys stored in `bucket`.
    pub fn keys(&self, bucket: &str) -> Vec<Vec<u8>> {
        self.inner
            .state
            .lock()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The signer the fake uses for download URLs.
    pub fn signer() -> QueryStringSigner {
        QueryStringSigner::new("FAKEACCESSKEY", b"fake-secret".to_vec(), FAKE_S3_HOST)
    }
}

fn no_such_key(key: &[u8]) -> ClientError {
    ClientError::new(
        404,
        "NoSuchKey",
        format!("key {} does not exist", String::from_utf8_lossy(key)),
    )
}

impl ObjectStoreConnector for FakeObjectStore {
    fn connect(&self, options: &ConnectOptions) -> ClientResult<Arc<dyn ObjectStoreClient>> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().last_options = Some(options.clone());
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(ClientError::transport("connection refused"));
        }
        Ok(Arc::new(self.clone()))
    }
}

impl ObjectStoreClient for FakeObjectStore {
    fn get_bucket(&self, bucket: &str, validate: bool) -> ClientResult<BucketInfo> {
        if validate && !self.has_bucket(bucket) {
            return Err(ClientError::no_such_bucket(bucket));
        }
        Ok(BucketInfo {
            name: bucket.to_string(),
        })
    }

    fn create_bucket(&self, bucket: &str) -> ClientResult<BucketInfo> {
        let mut state = self.inner.state.lock();
        if state.buckets.contains_key(bucket) {
            return Err(ClientError::new(
                409,
                "BucketAlreadyOwnedByYou",
                format!("bucket {bucket} already exists"),
            ));
        }
        state.buckets.insert(bucket.to_string(), FakeBucket::default());
        Ok(BucketInfo {
            name: bucket.to_string(),
        })
    }

    fn set_bucket_acl(&self, bucket: &str, acl: &str) -> ClientResult<()> {
        let mut state = self.inner.state.lock();
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        entry.acl = Some(acl.to_string());
        Ok(())
    }

    fn delete_bucket(&self, bucket: &str) -> ClientResult<()> {
        self.inner
            .state
            .lock()
            .buckets
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| ClientError::no_such_bucket(bucket))
    }

    fn list_buckets(&self) -> ClientResult<Vec<String>> {
        Ok(self.inner.state.lock().buckets.keys().cloned().collect())
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &[u8],
        body: &[u8],
        options: &PutOptions,
    ) -> ClientResult<()> {
        let mut state = self.inner.state.lock();
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        entry.objects.insert(
            key.to_vec(),
            FakeObject {
                data: body.to_vec(),
                content_type: Some(options.content_type.clone()),
                acl: Some(options.acl.clone()),
                headers: options.headers.clone(),
                reduced_redundancy: options.reduced_redundancy,
                last_modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn head_object(&self, bucket: &str, key: &[u8]) -> ClientResult<Option<ObjectInfo>> {
        self.inner.heads.fetch_add(1, Ordering::SeqCst);
        let state = self.inner.state.lock();
        let entry = state.buckets.get(bucket).ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        Ok(entry.objects.get(key).map(|o| o.info(key.to_vec())))
    }

    fn get_object_range(
        &self,
        bucket: &str,
        key: &[u8],
        offset: u64,
        len: Option<u64>,
    ) -> ClientResult<Vec<u8>> {
        let state = self.inner.state.lock();
        let entry = state.buckets.get(bucket).ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        let object = entry.objects.get(key).ok_or_else(|| no_such_key(key))?;
        Ok(object.range(offset, len))
    }

    fn delete_object(&self, bucket: &str, key: &[u8]) -> ClientResult<()> {
        let mut state = self.inner.state.lock();
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        entry
            .objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| no_such_key(key))
    }

    fn list_objects(&self, bucket: &str, prefix: &[u8]) -> ClientResult<Vec<ObjectInfo>> {
        self.inner.lists.fetch_add(1, Ordering::SeqCst);
        let state = self.inner.state.lock();
        let entry = state.buckets.get(bucket).ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        Ok(entry
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| object.info(key.clone()))
            .collect())
    }

    fn generate_url(&self, request: &PresignRequest) -> ClientResult<String> {
        Ok(Self::signer().url(request, SystemTime::now()))
    }
}

// ---------------------------------------------------------------------------
// Container store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FakeContainer {
    public: bool,
    objects: BTreeMap<String, FakeObject>,
}

#[derive(Debug, Default)]
struct ContainerStoreState {
    containers: BTreeMap<String, FakeContainer>,
    last_options: Option<ContainerConnectOptions>,
}

#[derive(Debug, Default)]
struct ContainerStoreInner {
    state: Mutex<ContainerStoreState>,
    refuse_connections: AtomicBool,
    connects: AtomicUsize,
    publishes: AtomicUsize,
}

/// A fake CloudFiles-style container store.
///
/// Public containers are served from `http://cdn.fake.test/<container>` and
/// `https://ssl.fake.test/<container>`.
#[derive(Debug, Clone, Default)]
pub struct FakeContainerStore {
    inner: Arc<ContainerStoreInner>,
}

impl FakeContainerStore {
    /// An empty store with no containers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty container.
    #[must_use]
    pub fn with_container(self, name: &str, public: bool) -> Self {
        self.inner
            .state
            .lock()
            .containers
            .entry(name.to_string())
            .or_default()
            .public = public;
        self
    }

    /// Makes every following connection attempt fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Number of connection attempts.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of `make_public` calls.
    pub fn publish_count(&self) -> usize {
        self.inner.publishes.load(Ordering::SeqCst)
    }

    /// Options of the most recent connection attempt.
    pub fn last_connect_options(&self) -> Option<ContainerConnectOptions> {
        self.inner.state.lock().last_options.clone()
    }

    /// Whether `container` exists and is public.
    pub fn is_public(&self, container: &str) -> bool {
        self.inner
            .state
            .lock()
            .containers
            .get(container)
            .is_some_and(|c| c.public)
    }

    /// The object stored under `name`.
    pub fn object(&self, container: &str, name: &str) -> Option<FakeObject> {
        self.inner
            .state
            .lock()
            .containers
            .get(container)
            .and_then(|c| c.objects.get(name).cloned())
    }

    fn info(name: &str, container: &FakeContainer) -> ContainerInfo {
        ContainerInfo {
            name: name.to_string(),
            public: container.public,
            public_uri: container
                .public
                .then(|| format!("http://cdn.fake.test/{name}")),
            public_ssl_uri: container
                .public
                .then(|| format!("https://ssl.fake.test/{name}")),
        }
    }
}

fn no_such_container(name: &str) -> ClientError {
    ClientError::new(404, "NoSuchContainer", format!("container {name} does not exist"))
}

fn no_such_object(name: &str) -> ClientError {
    ClientError::new(404, "NoSuchObject", format!("object {name} does not exist"))
}

impl ContainerConnector for FakeContainerStore {
    fn connect(&self, options: &ContainerConnectOptions) -> ClientResult<Arc<dyn ContainerClient>> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().last_options = Some(options.clone());
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(ClientError::new(401, "Unauthorized", "authentication failed"));
        }
        Ok(Arc::new(self.clone()))
    }
}

impl ContainerClient for FakeContainerStore {
    fn get_container(&self, name: &str) -> ClientResult<ContainerInfo> {
        let state = self.inner.state.lock();
        let container = state
            .containers
            .get(name)
            .ok_or_else(|| no_such_container(name))?;
        Ok(Self::info(name, container))
    }

    fn create_container(&self, name: &str) -> ClientResult<ContainerInfo> {
        let mut state = self.inner.state.lock();
        let container = state.containers.entry(name.to_string()).or_default();
        Ok(Self::info(name, container))
    }

    fn make_public(&self, name: &str) -> ClientResult<ContainerInfo> {
        self.inner.publishes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.inner.state.lock();
        let container = state
            .containers
            .get_mut(name)
            .ok_or_else(|| no_such_container(name))?;
        container.public = true;
        Ok(Self::info(name, container))
    }

    fn delete_container(&self, name: &str) -> ClientResult<()> {
        self.inner
            .state
            .lock()
            .containers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| no_such_container(name))
    }

    fn list_containers(&self) -> ClientResult<Vec<String>> {
        Ok(self.inner.state.lock().containers.keys().cloned().collect())
    }

    fn put_object(
        &self,
        container: &str,
        name: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> ClientResult<()> {
        let mut state = self.inner.state.lock();
        let entry = state
            .containers
            .get_mut(container)
            .ok_or_else(|| no_such_container(container))?;
        entry.objects.insert(
            name.to_string(),
            FakeObject {
                data: body.to_vec(),
                content_type: content_type.map(str::to_string),
                acl: None,
                headers: BTreeMap::new(),
                reduced_redundancy: false,
                last_modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn get_object(&self, container: &str, name: &str) -> ClientResult<ObjectInfo> {
        let state = self.inner.state.lock();
        let entry = state
            .containers
            .get(container)
            .ok_or_else(|| no_such_container(container))?;
        entry
            .objects
            .get(name)
            .map(|o| o.info(name.as_bytes().to_vec()))
            .ok_or_else(|| no_such_object(name))
    }

    fn read_object(
        &self,
        container: &str,
        name: &str,
        offset: u64,
        len: Option<u64>,
    ) -> ClientResult<Vec<u8>> {
        let state = self.inner.state.lock();
        let entry = state
            .containers
            .get(container)
            .ok_or_else(|| no_such_container(container))?;
        let object = entry.objects.get(name).ok_or_else(|| no_such_object(name))?;
        Ok(object.range(offset, len))
    }

    fn delete_object(&self, container: &str, name: &str) -> ClientResult<()> {
        let mut state = self.inner.state.lock();
        let entry = state
            .containers
            .get_mut(container)
            .ok_or_else(|| no_such_container(container))?;
        entry
            .objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| no_such_object(name))
    }

    fn list_objects(&self, container: &str) -> ClientResult<Vec<ObjectInfo>> {
        let state = self.inner.state.lock();
        let entry = state
            .containers
            .get(container)
            .ok_or_else(|| no_such_container(container))?;
        Ok(entry
            .objects
            .iter()
            .map(|(name, object)| object.info(name.as_bytes().to_vec()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// URL builder
// ---------------------------------------------------------------------------

/// A [`UrlBuilder`] that records every request and answers
/// `/<view>/<name>`.
#[derive(Debug, Clone, Default)]
pub struct RecordingUrlBuilder {
    requests: Arc<Mutex<Vec<(String, String)>>>,
    secure: Arc<AtomicBool>,
}

impl RecordingUrlBuilder {
    /// A builder with no recorded requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(view, name)` pair asked for so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }

    /// Sets what [`UrlBuilder::request_is_secure`] reports.
    pub fn set_secure(&self, secure: bool) {
        self.secure.store(secure, Ordering::SeqCst);
    }
}

impl UrlBuilder for RecordingUrlBuilder {
    fn file_url(&self, view: &str, name: &str) -> String {
        self.requests.lock().push((view.to_string(), name.to_string()));
        format!("/{view}/{name}")
    }

    fn request_is_secure(&self) -> bool {
        self.secure.load(Ordering::SeqCst)
    }
}
