//! Query-string signing for download URLs.
//!
//! Object-store client implementations use this to satisfy
//! [`ObjectStoreClient::generate_url`](crate::client::ObjectStoreClient::generate_url).
//!
//! ## URL Format
//!
//! ```text
//! <scheme>://<host>/<bucket>/<key>?AWSAccessKeyId=<id>&Expires=<unix>&Signature=<sig>
//! ```
//!
//! The signature is HMAC-SHA256 over `METHOD\n<expires>\n/<bucket>/<key>`,
//! base64url-encoded without padding.

use crate::client::PresignRequest;
use crate::error::{StorageError, StorageResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies query-string authenticated URLs.
#[derive(Clone)]
pub struct QueryStringSigner {
    access_key: String,
    secret: Vec<u8>,
    host: String,
}

impl std::fmt::Debug for QueryStringSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStringSigner")
            .field("access_key", &self.access_key)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl QueryStringSigner {
    /// Creates a signer for `host` using the given credentials.
    pub fn new(access_key: impl Into<String>, secret: impl Into<Vec<u8>>, host: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret: secret.into(),
            host: host.into(),
        }
    }

    /// Builds the URL for `request`, signed when `query_auth` is set.
    pub fn url(&self, request: &PresignRequest, now: SystemTime) -> String {
        let scheme = if request.force_http { "http" } else { "https" };
        let key = percent_encode(&request.key);
        let base = format!("{scheme}://{}/{}/{key}", self.host, request.bucket);

        if !request.query_auth {
            return base;
        }

        let expires = unix_seconds(now) + request.expires_in.as_secs();
        let signature = self.sign(&request.method, expires, &request.bucket, &key);
        format!(
            "{base}?AWSAccessKeyId={}&Expires={expires}&Signature={signature}",
            self.access_key
        )
    }

    /// Checks a signature produced by [`QueryStringSigner::url`].
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the URL has expired or the signature is wrong
    pub fn verify(
        &self,
        method: &str,
        bucket: &str,
        encoded_key: &str,
        expires: u64,
        signature: &str,
        now: SystemTime,
    ) -> StorageResult<()> {
        if unix_seconds(now) > expires {
            return Err(StorageError::PermissionDenied {
                name: encoded_key.to_string(),
                message: "signed URL has expired".into(),
            });
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| invalid_signature(encoded_key))?;
        let mut mac = self.mac();
        mac.update(string_to_sign(method, expires, bucket, encoded_key).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| invalid_signature(encoded_key))
    }

    fn sign(&self, method: &str, expires: u64, bucket: &str, encoded_key: &str) -> String {
        let mut mac = self.mac();
        mac.update(string_to_sign(method, expires, bucket, encoded_key).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }
}

fn invalid_signature(name: &str) -> StorageError {
    StorageError::PermissionDenied {
        name: name.to_string(),
        message: "signature does not match".into(),
    }
}

fn string_to_sign(method: &str, expires: u64, bucket: &str, encoded_key: &str) -> String {
    format!("{method}\n{expires}\n/{bucket}/{encoded_key}")
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Percent-encodes key bytes, leaving `/` and RFC 3986 unreserved bytes.
pub fn percent_encode(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
