//! Storage configuration.
//!
//! [`Settings`] is a flat key/value map in the shape a web framework's config
//! dict has. Each backend reads its own keys out of it into a typed config
//! struct; the structs can also be built directly with `with_*` methods.

use crate::charset::NameCharset;
use crate::client::CallingFormat;
use crate::error::{StorageError, StorageResult};
use crate::path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Every configuration key the storage layer understands.
pub const KNOWN_KEYS: &[&str] = &[
    "DEFAULT_FILE_STORAGE",
    "TESTING",
    "UPLOADS_FOLDER",
    "FILE_SYSTEM_STORAGE_FILE_VIEW",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_STORAGE_BUCKET_NAME",
    "AWS_AUTO_CREATE_BUCKET",
    "AWS_DEFAULT_ACL",
    "AWS_BUCKET_ACL",
    "AWS_S3_FILE_OVERWRITE",
    "AWS_HEADERS",
    "AWS_PRELOAD_METADATA",
    "AWS_QUERYSTRING_AUTH",
    "AWS_QUERYSTRING_EXPIRE",
    "AWS_REDUCED_REDUNDANCY",
    "AWS_S3_CUSTOM_DOMAIN",
    "AWS_S3_SECURE_URLS",
    "AWS_LOCATION",
    "AWS_S3_FILE_NAME_CHARSET",
    "AWS_S3_CALLING_FORMAT",
    "CLOUDFILES_USERNAME",
    "CLOUDFILES_API_KEY",
    "CLOUDFILES_CONTAINER",
    "CLOUDFILES_TIMEOUT",
    "CLOUDFILES_SERVICENET",
    "CLOUDFILES_AUTO_CREATE_CONTAINER",
    "CLOUDFILES_SECURE_URIS",
    "CLOUDFILES_CONTAINER_URIS",
];

/// Application configuration values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    /// Creates an empty settings map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the text is not a JSON object.
    pub fn from_json(text: &str) -> StorageResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| StorageError::invalid_argument(format!("settings: {e}")))
    }

    /// Reads every [`KNOWN_KEYS`] entry from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every [`KNOWN_KEYS`] entry through `lookup`.
    ///
    /// Values that parse as JSON keep their JSON type (`true`, `3600`,
    /// `{"a": "b"}`); anything else is kept as a string.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::new();
        for key in KNOWN_KEYS {
            if let Some(raw) = lookup(key) {
                let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                settings.values.insert((*key).to_string(), value);
            }
        }
        settings
    }

    /// Sets a value, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Reads a string value.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the value is not a string.
    pub fn get_str(&self, key: &str) -> StorageResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    /// Reads a boolean; `"true"`/`"false"`/`"1"`/`"0"` strings are accepted.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the value is not a boolean.
    pub fn get_bool(&self, key: &str) -> StorageResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Some(false)),
                _ => Err(wrong_type(key, "a boolean", &Value::String(s.clone()))),
            },
            Some(other) => Err(wrong_type(key, "a boolean", other)),
        }
    }

    /// Reads a non-negative integer; numeric strings are accepted.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the value is not a non-negative integer.
    pub fn get_u64(&self, key: &str) -> StorageResult<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| wrong_type(key, "a non-negative integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| wrong_type(key, "a non-negative integer", &Value::String(s.clone()))),
            Some(other) => Err(wrong_type(key, "a non-negative integer", other)),
        }
    }

    /// Reads an object of string values.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the value is not an object of strings.
    pub fn get_map(&self, key: &str) -> StorageResult<Option<BTreeMap<String, String>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(wrong_type(key, "an object of strings", other)),
                })
                .collect::<StorageResult<BTreeMap<_, _>>>()
                .map(Some),
            Some(other) => Err(wrong_type(key, "an object", other)),
        }
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> StorageError {
    StorageError::invalid_argument(format!("setting {key} must be {expected}, found {found}"))
}

/// Configuration for the local filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemConfig {
    /// Root directory; made absolute when the backend is built.
    pub folder: PathBuf,
    /// Name of the application view that serves uploaded files.
    pub file_view: String,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            file_view: "uploads.uploaded_file".to_string(),
        }
    }
}

impl FileSystemConfig {
    /// Creates a configuration rooted at `folder`.
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// Reads `UPLOADS_FOLDER` and `FILE_SYSTEM_STORAGE_FILE_VIEW`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a value has the wrong type.
    pub fn from_settings(settings: &Settings) -> StorageResult<Self> {
        let mut config = Self::default();
        if let Some(folder) = settings.get_str("UPLOADS_FOLDER")? {
            config.folder = PathBuf::from(folder);
        }
        if let Some(view) = settings.get_str("FILE_SYSTEM_STORAGE_FILE_VIEW")? {
            config.file_view = view;
        }
        Ok(config)
    }

    /// Sets the file view name.
    #[must_use]
    pub fn with_file_view(mut self, view: impl Into<String>) -> Self {
        self.file_view = view.into();
        self
    }
}

/// Configuration for the S3-style object store backend.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Bucket holding the files.
    pub bucket_name: Option<String>,
    /// Access key id.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Create the bucket on first access if it is missing.
    pub auto_create_bucket: bool,
    /// Canned ACL applied to uploaded objects.
    pub acl: String,
    /// Canned ACL applied to created buckets; defaults to `acl`.
    pub bucket_acl: Option<String>,
    /// Replace existing objects instead of picking a free name.
    pub file_overwrite: bool,
    /// Extra headers sent with every upload.
    pub headers: BTreeMap<String, String>,
    /// Index bucket keys once and answer existence checks from the index.
    pub preload_metadata: bool,
    /// Sign download URLs.
    pub querystring_auth: bool,
    /// Lifetime of signed URLs.
    pub querystring_expire: Duration,
    /// Upload with the reduced redundancy storage class.
    pub reduced_redundancy: bool,
    /// Serve URLs from this domain instead of signing.
    pub custom_domain: Option<String>,
    /// Use `https` URLs.
    pub secure_urls: bool,
    /// Key prefix all names are confined under.
    pub location: String,
    /// Charset object keys are encoded in.
    pub file_name_charset: NameCharset,
    /// Bucket addressing style.
    pub calling_format: CallingFormat,
    /// Transport timeout handed to the connector.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket_name", &self.bucket_name)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("auto_create_bucket", &self.auto_create_bucket)
            .field("acl", &self.acl)
            .field("location", &self.location)
            .field("custom_domain", &self.custom_domain)
            .finish_non_exhaustive()
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket_name: None,
            access_key: None,
            secret_key: None,
            auto_create_bucket: false,
            acl: "public-read".to_string(),
            bucket_acl: None,
            file_overwrite: false,
            headers: BTreeMap::new(),
            preload_metadata: false,
            querystring_auth: true,
            querystring_expire: Duration::from_secs(3600),
            reduced_redundancy: false,
            custom_domain: None,
            secure_urls: true,
            location: String::new(),
            file_name_charset: NameCharset::Utf8,
            calling_format: CallingFormat::Subdomain,
            timeout: None,
        }
    }
}

impl S3Config {
    /// Creates a configuration for `bucket`.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket_name: Some(bucket.into()),
            ..Self::default()
        }
    }

    /// Reads the `AWS_*` keys.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a value has the wrong type or names an unknown
    /// charset or calling format.
    pub fn from_settings(settings: &Settings) -> StorageResult<Self> {
        let mut config = Self::default();
        config.bucket_name = settings.get_str("AWS_STORAGE_BUCKET_NAME")?;
        config.access_key = settings.get_str("AWS_ACCESS_KEY_ID")?;
        config.secret_key = settings.get_str("AWS_SECRET_ACCESS_KEY")?;
        if let Some(v) = settings.get_bool("AWS_AUTO_CREATE_BUCKET")? {
            config.auto_create_bucket = v;
        }
        if let Some(v) = settings.get_str("AWS_DEFAULT_ACL")? {
            config.acl = v;
        }
        config.bucket_acl = settings.get_str("AWS_BUCKET_ACL")?;
        if let Some(v) = settings.get_bool("AWS_S3_FILE_OVERWRITE")? {
            config.file_overwrite = v;
        }
        if let Some(v) = settings.get_map("AWS_HEADERS")? {
            config.headers = v;
        }
        if let Some(v) = settings.get_bool("AWS_PRELOAD_METADATA")? {
            config.preload_metadata = v;
        }
        if let Some(v) = settings.get_bool("AWS_QUERYSTRING_AUTH")? {
            config.querystring_auth = v;
        }
        if let Some(v) = settings.get_u64("AWS_QUERYSTRING_EXPIRE")? {
            config.querystring_expire = Duration::from_secs(v);
        }
        if let Some(v) = settings.get_bool("AWS_REDUCED_REDUNDANCY")? {
            config.reduced_redundancy = v;
        }
        config.custom_domain = settings.get_str("AWS_S3_CUSTOM_DOMAIN")?;
        if let Some(v) = settings.get_bool("AWS_S3_SECURE_URLS")? {
            config.secure_urls = v;
        }
        if let Some(v) = settings.get_str("AWS_LOCATION")? {
            config = config.with_location(v);
        }
        if let Some(v) = settings.get_str("AWS_S3_FILE_NAME_CHARSET")? {
            config.file_name_charset = NameCharset::parse(&v)?;
        }
        if let Some(v) = settings.get_str("AWS_S3_CALLING_FORMAT")? {
            config.calling_format = CallingFormat::parse(&v).ok_or_else(|| {
                StorageError::invalid_argument(format!("unknown calling format: {v}"))
            })?;
        }
        Ok(config)
    }

    /// ACL applied to buckets this backend creates.
    pub fn effective_bucket_acl(&self) -> &str {
        self.bucket_acl.as_deref().unwrap_or(&self.acl)
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Sets whether a missing bucket is created on first access.
    #[must_use]
    pub const fn with_auto_create_bucket(mut self, value: bool) -> Self {
        self.auto_create_bucket = value;
        self
    }

    /// Sets the object ACL.
    #[must_use]
    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = acl.into();
        self
    }

    /// Sets whether saves replace existing objects.
    #[must_use]
    pub const fn with_file_overwrite(mut self, value: bool) -> Self {
        self.file_overwrite = value;
        self
    }

    /// Adds an upload header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets whether the key index is preloaded.
    #[must_use]
    pub const fn with_preload_metadata(mut self, value: bool) -> Self {
        self.preload_metadata = value;
        self
    }

    /// Sets whether URLs are signed.
    #[must_use]
    pub const fn with_querystring_auth(mut self, value: bool) -> Self {
        self.querystring_auth = value;
        self
    }

    /// Sets the signed URL lifetime.
    #[must_use]
    pub const fn with_querystring_expire(mut self, expire: Duration) -> Self {
        self.querystring_expire = expire;
        self
    }

    /// Sets the reduced redundancy flag.
    #[must_use]
    pub const fn with_reduced_redundancy(mut self, value: bool) -> Self {
        self.reduced_redundancy = value;
        self
    }

    /// Serves URLs from a custom domain.
    #[must_use]
    pub fn with_custom_domain(mut self, domain: impl Into<String>) -> Self {
        self.custom_domain = Some(domain.into());
        self
    }

    /// Sets whether URLs use `https`.
    #[must_use]
    pub const fn with_secure_urls(mut self, value: bool) -> Self {
        self.secure_urls = value;
        self
    }

    /// Sets the key prefix. It is stored cleaned, so `/static/`, `./static`
    /// and `static` all name the same prefix.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = path::clean(&location.into());
        self
    }

    /// Sets the key charset.
    #[must_use]
    pub const fn with_file_name_charset(mut self, charset: NameCharset) -> Self {
        self.file_name_charset = charset;
        self
    }

    /// Sets the connector timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Configuration for the CloudFiles-style container backend.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudFilesConfig {
    /// Account user name.
    pub username: Option<String>,
    /// Account API key.
    pub api_key: Option<String>,
    /// Container holding the files.
    pub container: Option<String>,
    /// Connection timeout.
    pub timeout: Duration,
    /// Connect over the provider's internal network.
    pub servicenet: bool,
    /// Create the container on first access if it is missing.
    pub auto_create_container: bool,
    /// Always hand out TLS URLs.
    pub secure_uris: bool,
    /// Static container name to base URL overrides.
    pub container_uris: BTreeMap<String, String>,
}

impl std::fmt::Debug for CloudFilesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFilesConfig")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("container", &self.container)
            .field("timeout", &self.timeout)
            .field("servicenet", &self.servicenet)
            .finish_non_exhaustive()
    }
}

impl Default for CloudFilesConfig {
    fn default() -> Self {
        Self {
            username: None,
            api_key: None,
            container: None,
            timeout: Duration::from_secs(5),
            servicenet: false,
            auto_create_container: false,
            secure_uris: false,
            container_uris: BTreeMap::new(),
        }
    }
}

impl CloudFilesConfig {
    /// Creates a configuration for `container`.
    #[must_use]
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            ..Self::default()
        }
    }

    /// Reads the `CLOUDFILES_*` keys.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a value has the wrong type.
    pub fn from_settings(settings: &Settings) -> StorageResult<Self> {
        let mut config = Self::default();
        config.username = settings.get_str("CLOUDFILES_USERNAME")?;
        config.api_key = settings.get_str("CLOUDFILES_API_KEY")?;
        config.container = settings.get_str("CLOUDFILES_CONTAINER")?;
        if let Some(v) = settings.get_u64("CLOUDFILES_TIMEOUT")? {
            config.timeout = Duration::from_secs(v);
        }
        if let Some(v) = settings.get_bool("CLOUDFILES_SERVICENET")? {
            config.servicenet = v;
        }
        if let Some(v) = settings.get_bool("CLOUDFILES_AUTO_CREATE_CONTAINER")? {
            config.auto_create_container = v;
        }
        if let Some(v) = settings.get_bool("CLOUDFILES_SECURE_URIS")? {
            config.secure_uris = v;
        }
        if let Some(v) = settings.get_map("CLOUDFILES_CONTAINER_URIS")? {
            config.container_uris = v;
        }
        Ok(config)
    }

    /// Sets the account credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether a missing container is created on first access.
    #[must_use]
    pub const fn with_auto_create_container(mut self, value: bool) -> Self {
        self.auto_create_container = value;
        self
    }

    /// Sets whether URLs always use TLS.
    #[must_use]
    pub const fn with_secure_uris(mut self, value: bool) -> Self {
        self.secure_uris = value;
        self
    }

    /// Overrides the public URL of a container.
    #[must_use]
    pub fn with_container_uri(mut self, container: impl Into<String>, uri: impl Into<String>) -> Self {
        self.container_uris.insert(container.into(), uri.into());
        self
    }
}

/// Configuration for the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Label identifying the storage; memory storages have no real root.
    pub label: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            label: "mock".to_string(),
        }
    }
}

impl MemoryConfig {
    /// Reads `UPLOADS_FOLDER` as the label, so a mock can stand in for a
    /// filesystem storage configured the same way.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the value is not a string.
    pub fn from_settings(settings: &Settings) -> StorageResult<Self> {
        let mut config = Self::default();
        if let Some(label) = settings.get_str("UPLOADS_FOLDER")? {
            config.label = label;
        }
        Ok(config)
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn typed_getters() {
        let settings = Settings::new()
            .with("A", "text")
            .with("B", true)
            .with("C", "false")
            .with("D", 42)
            .with("E", "3600")
            .with("F", json!({"Cache-Control": "max-age=60"}));

        assert_eq!(settings.get_str("A").unwrap().as_deref(), Some("text"));
        assert_eq!(settings.get_bool("B").unwrap(), Some(true));
        assert_eq!(settings.get_bool("C").unwrap(), Some(false));
        assert_eq!(settings.get_u64("D").unwrap(), Some(42));
        assert_eq!(settings.get_u64("E").unwrap(), Some(3600));
        assert_eq!(
            settings.get_map("F").unwrap().unwrap().get("Cache-Control").map(String::as_str),
            Some("max-age=60")
        );
        assert_eq!(settings.get_str("MISSING").unwrap(), None);
    }

    #[test]
    fn wrong_types_are_rejected() {
        let settings = Settings::new().with("A", 1).with("B", "maybe").with("C", -5);
        assert_eq!(settings.get_str("A").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(settings.get_bool("B").is_err());
        assert!(settings.get_u64("C").is_err());
    }

    #[test]
    fn null_is_treated_as_missing() {
        let settings = Settings::from_json(r#"{"AWS_S3_CUSTOM_DOMAIN": null}"#).unwrap();
        assert_eq!(settings.get_str("AWS_S3_CUSTOM_DOMAIN").unwrap(), None);
    }

    #[test]
    fn lookup_parses_json_values() {
        let settings = Settings::from_lookup(|key| match key {
            "AWS_AUTO_CREATE_BUCKET" => Some("true".into()),
            "AWS_QUERYSTRING_EXPIRE" => Some("60".into()),
            "AWS_STORAGE_BUCKET_NAME" => Some("media".into()),
            "CLOUDFILES_CONTAINER_URIS" => Some(r#"{"media": "https://cdn"}"#.into()),
            _ => None,
        });
        assert_eq!(settings.get("AWS_AUTO_CREATE_BUCKET"), Some(&Value::Bool(true)));
        assert_eq!(settings.get_u64("AWS_QUERYSTRING_EXPIRE").unwrap(), Some(60));
        assert_eq!(settings.get_str("AWS_STORAGE_BUCKET_NAME").unwrap().as_deref(), Some("media"));
        assert!(settings.get_map("CLOUDFILES_CONTAINER_URIS").unwrap().is_some());
    }

    #[test]
    fn s3_defaults() {
        let config = S3Config::from_settings(&Settings::new()).unwrap();
        assert_eq!(config.acl, "public-read");
        assert_eq!(config.effective_bucket_acl(), "public-read");
        assert!(config.querystring_auth);
        assert!(config.secure_urls);
        assert_eq!(config.querystring_expire, Duration::from_secs(3600));
        assert_eq!(config.file_name_charset, NameCharset::Utf8);
        assert_eq!(config.calling_format, CallingFormat::Subdomain);
    }

    #[test]
    fn s3_from_settings() {
        let settings = Settings::new()
            .with("AWS_STORAGE_BUCKET_NAME", "media")
            .with("AWS_LOCATION", "/static/")
            .with("AWS_BUCKET_ACL", "private")
            .with("AWS_S3_FILE_NAME_CHARSET", "latin-1")
            .with("AWS_S3_CALLING_FORMAT", "path")
            .with("AWS_HEADERS", json!({"Cache-Control": "no-cache"}));
        let config = S3Config::from_settings(&settings).unwrap();

        assert_eq!(config.bucket_name.as_deref(), Some("media"));
        assert_eq!(config.location, "static");
        assert_eq!(config.effective_bucket_acl(), "private");
        assert_eq!(config.file_name_charset, NameCharset::Latin1);
        assert_eq!(config.calling_format, CallingFormat::Path);
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn s3_rejects_unknown_calling_format() {
        let settings = Settings::new().with("AWS_S3_CALLING_FORMAT", "smoke-signal");
        assert!(S3Config::from_settings(&settings).is_err());
    }

    #[test]
    fn s3_debug_redacts_secret() {
        let config = S3Config::new("b").with_credentials("id", "very-secret");
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[test]
    fn cloudfiles_defaults_and_builder() {
        let config = CloudFilesConfig::from_settings(&Settings::new()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.servicenet);

        let config = CloudFilesConfig::new("assets")
            .with_timeout(Duration::from_secs(10))
            .with_secure_uris(true)
            .with_container_uri("assets", "https://cdn.example.com");
        assert_eq!(config.container.as_deref(), Some("assets"));
        assert!(config.secure_uris);
        assert_eq!(config.container_uris.len(), 1);
    }

    #[test]
    fn filesystem_from_settings() {
        let settings = Settings::new()
            .with("UPLOADS_FOLDER", "/srv/uploads")
            .with("FILE_SYSTEM_STORAGE_FILE_VIEW", "custom.file_view");
        let config = FileSystemConfig::from_settings(&settings).unwrap();
        assert_eq!(config.folder, PathBuf::from("/srv/uploads"));
        assert_eq!(config.file_view, "custom.file_view");
    }

    #[test]
    fn memory_label() {
        assert_eq!(MemoryConfig::default().label, "mock");
        let settings = Settings::new().with("UPLOADS_FOLDER", "scratch");
        assert_eq!(MemoryConfig::from_settings(&settings).unwrap().label, "scratch");
        assert_eq!(MemoryConfig::default().with_label("x").label, "x");
    }
}
