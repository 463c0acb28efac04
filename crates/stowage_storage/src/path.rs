//! Name sanitization, root confinement and collision avoidance.
//!
//! Logical names are always `/`-separated and relative to a storage root,
//! whatever the host OS uses. All functions here are pure apart from the
//! caller-supplied existence predicate in [`get_available_name`].

use crate::error::{StorageError, StorageResult};
use unicode_normalization::UnicodeNormalization;

/// Upper bound on suffixed candidates tried by [`get_available_name`].
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Normalizes separators and collapses `.`/`..` segments.
///
/// Backslashes become `/`, empty and `.` segments are dropped, and `x/..`
/// pairs cancel. Leading separators are stripped because names are always
/// relative to a root. A `..` that would rise above the start is kept, so
/// [`confine`] can reject it.
///
/// ```rust
/// use stowage_storage::path::clean;
///
/// assert_eq!(clean("a/./b/../c.txt"), "a/c.txt");
/// assert_eq!(clean("\\docs\\x.pdf"), "docs/x.pdf");
/// assert_eq!(clean("../x"), "../x");
/// ```
pub fn clean(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Joins `name` onto `root` without ever leaving `root`.
///
/// The name is resolved segment by segment on top of the root's own
/// segments. A `..` that would pop into or above the root fails with
/// [`StorageError::SecurityViolation`]; the result is never clamped. An
/// empty `root` yields the confined relative name.
///
/// # Errors
///
/// - `SecurityViolation` if the name escapes the root
/// - `InvalidArgument` if the name contains a NUL byte
pub fn confine(root: &str, name: &str) -> StorageResult<String> {
    if name.contains('\0') {
        return Err(StorageError::invalid_argument(
            "name contains a NUL byte",
        ));
    }

    let root = root.replace('\\', "/");
    let absolute = root.starts_with('/');
    let root_trimmed = root.trim_end_matches('/');

    let mut segments: Vec<&str> = root_trimmed
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let floor = segments.len();

    let normalized = name.replace('\\', "/");
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.len() <= floor {
                    tracing::warn!(root = %root, name = %name, "rejected name escaping storage root");
                    return Err(StorageError::security_violation(name));
                }
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    let joined = if absolute { format!("/{joined}") } else { joined };

    // The textual prefix check is the actual guarantee.
    let prefix = if absolute && root_trimmed.is_empty() {
        "/"
    } else {
        root_trimmed
    };
    let within = prefix.is_empty()
        || joined == prefix
        || prefix == "/"
        || joined
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'));
    if !within {
        tracing::warn!(root = %root, name = %name, "rejected name escaping storage root");
        return Err(StorageError::security_violation(name));
    }

    Ok(joined)
}

/// Reduces a single file name to a conservative ASCII form.
///
/// The name is NFKD-decomposed so accented letters keep their base letter.
/// Path separators turn into spaces, remaining non-ASCII characters are
/// dropped, whitespace runs become `_`, and anything outside `[A-Za-z0-9_.-]` is
/// removed. Leading and trailing `.` and `_` are stripped, so the result can
/// never be `..` or a hidden file.
///
/// ```rust
/// use stowage_storage::path::secure_filename;
///
/// assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
/// assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
/// assert_eq!(secure_filename("café.txt"), "cafe.txt");
/// ```
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .filter(char::is_ascii)
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Splits a file name into `(stem, extension)`; the extension keeps its dot.
///
/// Only the last segment is considered and a leading dot does not start an
/// extension, so `.bashrc` has none.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    let leading_dots = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[leading_dots..].rfind('.') {
        Some(idx) => file_name.split_at(leading_dots + idx),
        None => (file_name, ""),
    }
}

/// Splits a logical name into its directory and final segment.
pub fn split_dir(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => ("", name),
    }
}

/// Joins a directory and a file name with a single `/`.
pub fn join(dir: &str, file_name: &str) -> String {
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), file_name)
    }
}

/// Returns a name that `exists` reports as free.
///
/// If `name` is free it is returned unchanged. Otherwise `stem_1.ext`,
/// `stem_2.ext`, … are tried in the same directory, each re-confined to the
/// logical root, until one is free.
///
/// The check and the subsequent write are not atomic; two concurrent writers
/// can pick the same name.
///
/// # Errors
///
/// - `ResourceExhausted` after [`MAX_NAME_ATTEMPTS`] candidates
/// - any error returned by `exists`
pub fn get_available_name<F>(mut exists: F, name: &str) -> StorageResult<String>
where
    F: FnMut(&str) -> StorageResult<bool>,
{
    if !exists(name)? {
        return Ok(name.to_string());
    }

    let (dir, file_name) = split_dir(name);
    let (stem, ext) = split_extension(file_name);

    for n in 1..=MAX_NAME_ATTEMPTS {
        let candidate = confine("", &join(dir, &format!("{stem}_{n}{ext}")))?;
        tracing::debug!(name = %name, candidate = %candidate, "name taken, trying next");
        if !exists(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(StorageError::ResourceExhausted {
        name: name.to_string(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}
