//! Capability traits for the cloud collaborators.
//!
//! The storage backends never talk to a cloud SDK directly. They consume the
//! minimal surface defined here, so any SDK (or an in-process fake) can be
//! plugged in. Implementations report failures as [`ClientError`]; the
//! backends classify those into the storage error taxonomy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Provider code for a bucket that does not exist.
pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";

/// A native error reported by a collaborator client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code} ({}): {message}", status_label(.status))]
pub struct ClientError {
    /// HTTP-style status, or `None` for transport failures.
    pub status: Option<u16>,
    /// Provider error code, e.g. `NoSuchKey`.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

impl ClientError {
    /// Creates an error with a status code.
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a transport-level error with no status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: "Transport".to_string(),
            message: message.into(),
        }
    }

    /// Creates a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, "NotFound", message)
    }

    /// Creates a 409 error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, "Conflict", message)
    }

    /// Creates the 404 a store reports for a missing bucket.
    pub fn no_such_bucket(bucket: &str) -> Self {
        Self::new(404, NO_SUCH_BUCKET, format!("bucket {bucket} does not exist"))
    }

    /// Whether this reports a missing bucket rather than a missing object.
    pub fn is_no_such_bucket(&self) -> bool {
        self.status == Some(404) && self.code == NO_SUCH_BUCKET
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no status".to_string(), |s| s.to_string())
}

/// Result type for collaborator calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Metadata about one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key or name as stored.
    pub key: Vec<u8>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if the provider reports one.
    pub last_modified: Option<SystemTime>,
    /// Stored content type, if any.
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Object store (S3-style)
// ---------------------------------------------------------------------------

/// How bucket names are placed into request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingFormat {
    /// `https://bucket.host/key`.
    #[default]
    Subdomain,
    /// `https://host/bucket/key`.
    Path,
    /// `https://bucket/key`, for buckets named after a CNAME.
    VHost,
}

impl CallingFormat {
    /// Parses a configuration value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "subdomain" => Some(Self::Subdomain),
            "path" | "ordinary" => Some(Self::Path),
            "vhost" => Some(Self::VHost),
            _ => None,
        }
    }
}

/// Options handed to [`ObjectStoreConnector::connect`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Access key id.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Bucket addressing style.
    pub calling_format: CallingFormat,
    /// Transport timeout, passed through untouched.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("calling_format", &self.calling_format)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A bucket as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
}

/// Per-upload options for [`ObjectStoreClient::put_object`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Content type of the body.
    pub content_type: String,
    /// Canned ACL, e.g. `public-read`.
    pub acl: String,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Use the reduced redundancy storage class.
    pub reduced_redundancy: bool,
}

/// Request for a download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    /// Bucket holding the object.
    pub bucket: String,
    /// Encoded object key.
    pub key: Vec<u8>,
    /// HTTP method the URL is valid for.
    pub method: String,
    /// Validity window for signed URLs.
    pub expires_in: Duration,
    /// Whether to sign the query string at all.
    pub query_auth: bool,
    /// Use `http` instead of `https`.
    pub force_http: bool,
}

/// Opens sessions against an object store.
pub trait ObjectStoreConnector: Send + Sync {
    /// Establishes a client session.
    fn connect(&self, options: &ConnectOptions) -> ClientResult<Arc<dyn ObjectStoreClient>>;
}

/// The bucket/object surface the S3 backend needs.
pub trait ObjectStoreClient: Send + Sync {
    /// Looks up a bucket. With `validate` the provider is asked whether it
    /// actually exists; without it a handle is returned unchecked.
    fn get_bucket(&self, bucket: &str, validate: bool) -> ClientResult<BucketInfo>;

    /// Creates a bucket. Fails with 409 if it exists.
    fn create_bucket(&self, bucket: &str) -> ClientResult<BucketInfo>;

    /// Applies a canned ACL to a bucket.
    fn set_bucket_acl(&self, bucket: &str, acl: &str) -> ClientResult<()>;

    /// Deletes a bucket.
    fn delete_bucket(&self, bucket: &str) -> ClientResult<()>;

    /// Lists all bucket names visible to the credentials.
    fn list_buckets(&self) -> ClientResult<Vec<String>>;

    /// Uploads a whole object in one request.
    fn put_object(
        &self,
        bucket: &str,
        key: &[u8],
        body: &[u8],
        options: &PutOptions,
    ) -> ClientResult<()>;

    /// Returns object metadata, or `None` if the key is absent.
    fn head_object(&self, bucket: &str, key: &[u8]) -> ClientResult<Option<ObjectInfo>>;

    /// Reads `len` bytes from `offset` (to the end when `len` is `None`).
    fn get_object_range(
        &self,
        bucket: &str,
        key: &[u8],
        offset: u64,
        len: Option<u64>,
    ) -> ClientResult<Vec<u8>>;

    /// Deletes an object.
    fn delete_object(&self, bucket: &str, key: &[u8]) -> ClientResult<()>;

    /// Lists objects whose key starts with `prefix`.
    fn list_objects(&self, bucket: &str, prefix: &[u8]) -> ClientResult<Vec<ObjectInfo>>;

    /// Builds a download URL, signed unless `query_auth` is off.
    fn generate_url(&self, request: &PresignRequest) -> ClientResult<String>;
}

// ---------------------------------------------------------------------------
// Container store (CloudFiles-style)
// ---------------------------------------------------------------------------

/// Options handed to [`ContainerConnector::connect`].
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerConnectOptions {
    /// Account user name.
    pub username: Option<String>,
    /// Account API key.
    pub api_key: Option<String>,
    /// Transport timeout.
    pub timeout: Duration,
    /// Route through the provider's internal network.
    pub servicenet: bool,
}

impl fmt::Debug for ContainerConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerConnectOptions")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("servicenet", &self.servicenet)
            .finish()
    }
}

/// A container as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Container name.
    pub name: String,
    /// Whether the container is served publicly.
    pub public: bool,
    /// Public plain-HTTP base URI.
    pub public_uri: Option<String>,
    /// Public TLS base URI.
    pub public_ssl_uri: Option<String>,
}

/// Opens sessions against a container store.
pub trait ContainerConnector: Send + Sync {
    /// Authenticates and returns a client.
    fn connect(&self, options: &ContainerConnectOptions) -> ClientResult<Arc<dyn ContainerClient>>;
}

/// The container/object surface the CloudFiles backend needs.
pub trait ContainerClient: Send + Sync {
    /// Fetches a container; 404 if absent.
    fn get_container(&self, name: &str) -> ClientResult<ContainerInfo>;

    /// Creates a container.
    fn create_container(&self, name: &str) -> ClientResult<ContainerInfo>;

    /// Publishes a container through the CDN.
    fn make_public(&self, name: &str) -> ClientResult<ContainerInfo>;

    /// Deletes a container.
    fn delete_container(&self, name: &str) -> ClientResult<()>;

    /// Lists container names.
    fn list_containers(&self) -> ClientResult<Vec<String>>;

    /// Uploads an object.
    fn put_object(
        &self,
        container: &str,
        name: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> ClientResult<()>;

    /// Fetches object metadata; 404 if absent.
    fn get_object(&self, container: &str, name: &str) -> ClientResult<ObjectInfo>;

    /// Reads a byte range of an object.
    fn read_object(
        &self,
        container: &str,
        name: &str,
        offset: u64,
        len: Option<u64>,
    ) -> ClientResult<Vec<u8>>;

    /// Deletes an object; 404 if absent.
    fn delete_object(&self, container: &str, name: &str) -> ClientResult<()>;

    /// Lists objects in a container.
    fn list_objects(&self, container: &str) -> ClientResult<Vec<ObjectInfo>>;
}
