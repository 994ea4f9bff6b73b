//! Fuzz target for entry-key normalization with arbitrary string input.
//!
//! Run with: cargo +nightly fuzz run archive_path
//!
//! Properties checked:
//! - normalization is idempotent
//! - normalized keys never hold backslashes or empty segments
//! - relative paths produced for extraction never escape the destination

#![no_main]

use arcflow::archive_path::{normalize_key, to_relative_path};
use libfuzzer_sys::fuzz_target;
use std::path::Component;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let key = normalize_key(raw);

    assert_eq!(normalize_key(&key), key, "not idempotent for {:?}", raw);
    assert!(!key.contains('\\'), "backslash in key {:?}", key);
    assert!(!key.split('/').any(str::is_empty) || key.is_empty(), "empty segment in {:?}", key);

    if let Some(path) = to_relative_path(&key) {
        assert!(
            path.components().all(|c| matches!(c, Component::Normal(_))),
            "escaping path {:?} for key {:?}",
            path,
            key
        );
    }
});
