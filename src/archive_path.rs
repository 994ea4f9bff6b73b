//! Entry key normalization.
//!
//! Archive containers spell entry paths differently: ZIP writers on Windows
//! emit backslashes, some TAR writers prefix `./` or `/`, folders end in a
//! separator. Every lookup in this crate (tree building on the write side,
//! subset extraction on the read side) goes through [`normalize_key`] so that
//! both sides compare the same string.
//!
//! ```
//! use arcflow::archive_path::{normalize_key, file_name};
//!
//! assert_eq!(normalize_key("\\img\\logo.png"), "img/logo.png");
//! assert_eq!(normalize_key("./docs/"), "docs");
//! assert_eq!(file_name("img/logo.png"), "logo.png");
//! ```

use std::path::{Component, Path, PathBuf};

/// Canonical separator used in normalized keys.
pub const SEPARATOR: char = '/';

/// Normalizes an entry path into a lookup key.
///
/// Backslashes become `/`, leading separators and `./` prefixes are stripped,
/// repeated separators collapse and a trailing separator is removed.
pub fn normalize_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for segment in raw.split(['/', '\\']) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if !key.is_empty() {
            key.push(SEPARATOR);
        }
        key.push_str(segment);
    }
    key
}

/// Returns true if the raw entry path denotes a folder (ends in a separator).
pub fn is_folder_path(raw: &str) -> bool {
    raw.ends_with('/') || raw.ends_with('\\')
}

/// Splits a normalized key into its segments.
pub fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Returns the last segment of a normalized key.
pub fn file_name(key: &str) -> &str {
    key.rsplit(SEPARATOR).next().unwrap_or(key)
}

/// Returns the parent key, or `None` for top-level keys.
pub fn parent(key: &str) -> Option<&str> {
    key.rfind(SEPARATOR).map(|idx| &key[..idx])
}

/// Returns the extension of the key's file name including the leading dot.
///
/// Dot-files such as `.gitignore` have no extension.
pub fn extension(key: &str) -> Option<&str> {
    let name = file_name(key);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx..]),
    }
}

/// Joins a parent key and a child segment.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// Converts a normalized key into a relative filesystem path.
///
/// Returns `None` when the key would escape the destination (`..` segments,
/// drive prefixes), so extraction never writes outside its folder.
pub fn to_relative_path(key: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for segment in segments(key) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return None,
        }
    }
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_key("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(normalize_key("/a/b"), "a/b");
        assert_eq!(normalize_key("//a//b//"), "a/b");
        assert_eq!(normalize_key("./a/./b"), "a/b");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_folder_detection() {
        assert!(is_folder_path("docs/"));
        assert!(is_folder_path("docs\\"));
        assert!(!is_folder_path("docs/readme.txt"));
    }

    #[test]
    fn test_file_name_and_parent() {
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
        assert_eq!(parent("a/b/c.txt"), Some("a/b"));
        assert_eq!(parent("c.txt"), None);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("dir/archive.zip"), Some(".zip"));
        assert_eq!(extension("dir/noext"), None);
        assert_eq!(extension(".gitignore"), None);
    }

    #[test]
    fn test_relative_path_rejects_traversal() {
        assert_eq!(
            to_relative_path("img/logo.png"),
            Some(PathBuf::from("img").join("logo.png"))
        );
        assert_eq!(to_relative_path("../etc/passwd"), None);
        assert_eq!(to_relative_path("a/../../b"), None);
        assert_eq!(to_relative_path(""), None);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[a-z/\\\\.]{0,24}") {
            let once = normalize_key(&raw);
            prop_assert_eq!(normalize_key(&once), once);
        }

        #[test]
        fn prop_normalized_has_no_edge_separators(raw in "[a-z/\\\\]{0,24}") {
            let key = normalize_key(&raw);
            prop_assert!(!key.starts_with('/'));
            prop_assert!(!key.ends_with('/'));
            prop_assert!(!key.contains('\\'));
            prop_assert!(!key.contains("//"));
        }

        #[test]
        fn prop_windows_and_unix_spellings_agree(parts in proptest::collection::vec("[a-z]{1,6}", 1..5)) {
            let unix = parts.join("/");
            let windows = parts.join("\\");
            prop_assert_eq!(normalize_key(&unix), normalize_key(&windows));
        }
    }
}
