//! The URL-building collaborator.
//!
//! The host application owns routing. The filesystem backend asks it for a
//! download URL for a named file view; the CloudFiles backend asks it whether
//! the request being served came in over TLS.

use std::fmt;

/// Maps logical names to application-visible URLs.
pub trait UrlBuilder: Send + Sync + fmt::Debug {
    /// Returns the URL under which `view` serves `name`.
    fn file_url(&self, view: &str, name: &str) -> String;

    /// Whether the inbound request currently being served is secure.
    fn request_is_secure(&self) -> bool {
        false
    }
}

/// A [`UrlBuilder`] that prefixes names with a fixed base URL.
///
/// The view name is ignored; every view serves from the same base.
#[derive(Debug, Clone)]
pub struct StaticUrlBuilder {
    base: String,
    secure: bool,
}

impl StaticUrlBuilder {
    /// Creates a builder serving from `base`, e.g. `/uploads`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            secure: false,
        }
    }

    /// Sets what [`UrlBuilder::request_is_secure`] reports.
    #[must_use]
    pub fn with_secure_requests(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

impl Default for StaticUrlBuilder {
    fn default() -> Self {
        Self::new("/uploads")
    }
}

impl UrlBuilder for StaticUrlBuilder {
    fn file_url(&self, _view: &str, name: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), name)
    }

    fn request_is_secure(&self) -> bool {
        self.secure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_builder_joins_base() {
        let builder = StaticUrlBuilder::new("https://cdn.example.com/files/");
        assert_eq!(
            builder.file_url("uploads.uploaded_file", "a/b.txt"),
            "https://cdn.example.com/files/a/b.txt"
        );
        assert!(!builder.request_is_secure());
    }

    #[test]
    fn secure_flag() {
        let builder = StaticUrlBuilder::default().with_secure_requests(true);
        assert!(builder.request_is_secure());
        assert_eq!(builder.file_url("v", "x"), "/uploads/x");
    }
}
