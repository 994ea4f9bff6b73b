//! Fuzz target for tree building over arbitrary archive bytes.
//!
//! The input's first byte picks the container type; the rest is written to a
//! scratch file and opened with `TreeBuilder`. Errors are expected, panics
//! and hangs are not.
//!
//! Run with: cargo +nightly fuzz run archive_tree

#![no_main]

use arcflow::{ArchiveType, TreeBuilder};
use libfuzzer_sys::fuzz_target;

const TYPES: [ArchiveType; 8] = [
    ArchiveType::Zip,
    ArchiveType::Tar,
    ArchiveType::TarGz,
    ArchiveType::TarBz2,
    ArchiveType::TarLz,
    ArchiveType::GZip,
    ArchiveType::BZip2,
    ArchiveType::SevenZip,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let archive_type = TYPES[usize::from(selector) % TYPES.len()];
    let path = std::env::temp_dir().join(format!(
        "arcflow-fuzz-{}{}",
        std::process::id(),
        archive_type.extension()
    ));
    if std::fs::write(&path, body).is_err() {
        return;
    }

    if let Ok(root) = TreeBuilder::new(&path).archive_type(archive_type).build() {
        // Every leaf must be reachable by its own key.
        for entry in root.node().walk() {
            assert!(root.find(&entry.key).is_some(), "unreachable key {:?}", entry.key);
        }
    }
    let _ = std::fs::remove_file(&path);
});
