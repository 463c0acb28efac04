//! Property-based test generators using proptest.
//!
//! Names come in three flavours: already-safe names that survive the save
//! pipeline unchanged, nested names with folders, and hostile names that try
//! to climb out of the root.

use proptest::prelude::*;

/// Strategy for file names that `secure_filename` leaves untouched.
pub fn file_name_strategy() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[a-zA-Z0-9]([a-zA-Z0-9_-]{0,14}[a-zA-Z0-9])?").expect("Invalid regex"),
        prop::sample::select(vec!["", ".txt", ".png", ".tar.gz", ".json"]),
    )
        .prop_map(|(stem, ext)| format!("{stem}{ext}"))
}

/// Strategy for `/`-separated names up to three folders deep.
pub fn nested_name_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(
            prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex"),
            0..3,
        ),
        file_name_strategy(),
    )
        .prop_map(|(dirs, file)| {
            let mut parts = dirs;
            parts.push(file);
            parts.join("/")
        })
}

/// Strategy for names that climb above the root at some point.
///
/// Every generated name has more `..` segments than the folders before
/// them, so no confinement may accept it.
pub fn traversal_name_strategy() -> impl Strategy<Value = String> {
    (
        0usize..3,
        1usize..4,
        prop::sample::select(vec!["/", "\\"]),
        file_name_strategy(),
    )
        .prop_map(|(depth, extra, sep, file)| {
            let mut parts: Vec<String> = (0..depth).map(|i| format!("d{i}")).collect();
            parts.extend(std::iter::repeat("..".to_string()).take(depth + extra));
            parts.push(file);
            parts.join(sep)
        })
}

/// Strategy for arbitrary file content.
pub fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_storage::path;

    proptest! {
        #[test]
        fn file_names_are_already_secure(name in file_name_strategy()) {
            prop_assert_eq!(path::secure_filename(&name), name);
        }

        #[test]
        fn traversal_names_escape(name in traversal_name_strategy()) {
            prop_assert!(path::confine("", &name).is_err());
            prop_assert!(path::confine("/srv/uploads", &name).is_err());
        }

        #[test]
        fn nested_names_are_clean(name in nested_name_strategy()) {
            prop_assert_eq!(path::clean(&name), name);
        }
    }
}
