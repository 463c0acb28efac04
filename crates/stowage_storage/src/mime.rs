//! Content type guessing from file extensions.

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const TYPES: &[(&str, &str)] = &[
    ("aac", "audio/aac"),
    ("avi", "video/x-msvideo"),
    ("bmp", "image/bmp"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("md", "text/markdown"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

/// Guesses a content type from the extension of `name`'s last segment.
///
/// Returns `None` for unknown or missing extensions.
pub fn guess_type(name: &str) -> Option<&'static str> {
    let (_, file_name) = crate::path::split_dir(name);
    let (_, ext) = crate::path::split_extension(file_name);
    let ext = ext.strip_prefix('.')?.to_ascii_lowercase();

    TYPES
        .binary_search_by(|(candidate, _)| candidate.cmp(&ext.as_str()))
        .ok()
        .map(|idx| TYPES[idx].1)
}

/// Like [`guess_type`], falling back to [`DEFAULT_CONTENT_TYPE`].
pub fn guess_type_or_default(name: &str) -> &'static str {
    guess_type(name).unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted() {
        assert!(TYPES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn known_extensions() {
        assert_eq!(guess_type("greeting.txt"), Some("text/plain"));
        assert_eq!(guess_type("pics/Photo.JPG"), Some("image/jpeg"));
        assert_eq!(guess_type("a.tar.gz"), Some("application/gzip"));
    }

    #[test]
    fn unknown_falls_back() {
        assert_eq!(guess_type("some_file"), None);
        assert_eq!(guess_type(".bashrc"), None);
        assert_eq!(guess_type_or_default("x.unknown"), DEFAULT_CONTENT_TYPE);
    }
}
