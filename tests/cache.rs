//! Root node cache with extracted and nested entries.

mod common;

use arcflow::{CancellationToken, EngineConfig, RootNodeCache, TreeBuilder};

#[test]
fn test_open_entry_reuses_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let archive = common::docs_tar_gz(dir.path(), "docs.tar.gz");
    let temp = dir.path().join("temp");
    let cache = RootNodeCache::new(&EngineConfig::default());
    let cancel = CancellationToken::new();

    let root = cache
        .get_or_build(&archive, None, || TreeBuilder::new(&archive).build())
        .unwrap();
    let logo = root.file("img/logo.png").unwrap().clone();

    let first = cache.open_entry(&root, &logo, &temp, &cancel).unwrap();
    assert_eq!(first, temp.join("logo.png"));
    assert_eq!(std::fs::read(&first).unwrap(), common::pattern(500));

    let second = cache.open_entry(&root, &logo, &temp, &cancel).unwrap();
    assert_eq!(second, first);
    assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 1);
}

#[test]
fn test_deleted_extraction_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let archive = common::docs_tar_gz(dir.path(), "docs.tar.gz");
    let temp = dir.path().join("temp");
    let cache = RootNodeCache::new(&EngineConfig::default());
    let cancel = CancellationToken::new();

    let root = cache
        .get_or_build(&archive, None, || TreeBuilder::new(&archive).build())
        .unwrap();
    let readme = root.file("readme.txt").unwrap().clone();

    let path = cache.open_entry(&root, &readme, &temp, &cancel).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(cache.extracted_path(&root, "readme.txt").is_none());

    let again = cache.open_entry(&root, &readme, &temp, &cancel).unwrap();
    assert_eq!(again, path);
    assert!(again.is_file());
    assert_eq!(std::fs::read(&again).unwrap(), b"hello world!");
    assert_eq!(cache.extracted_path(&root, "readme.txt"), Some(again.clone()));

    let third = cache.open_entry(&root, &readme, &temp, &cancel).unwrap();
    assert_eq!(third, again);
    assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 1);
}

#[test]
fn test_open_nested_archive() {
    let dir = tempfile::tempdir().unwrap();
    let inner = common::docs_tar_gz(dir.path(), "inner.tar.gz");
    let inner_bytes = std::fs::read(&inner).unwrap();
    let outer = common::zip_with_entries(
        dir.path(),
        "outer.zip",
        &[("nested/inner.tar.gz", &inner_bytes), ("top.txt", b"t")],
    );
    let temp = dir.path().join("temp");
    let cache = RootNodeCache::new(&EngineConfig::default());
    let cancel = CancellationToken::new();

    let root = cache
        .get_or_build(&outer, None, || TreeBuilder::new(&outer).build())
        .unwrap();
    let entry = root.file("nested/inner.tar.gz").unwrap().clone();

    let nested = cache.open_nested(&root, &entry, &temp, None, &cancel).unwrap();
    assert_eq!(nested.file("readme.txt").unwrap().size, 12);
    assert_eq!(cache.len(), 2);

    let again = cache.open_nested(&root, &entry, &temp, None, &cancel).unwrap();
    assert!(std::sync::Arc::ptr_eq(&nested, &again));

    let plain = root.file("top.txt").unwrap().clone();
    assert!(cache.open_nested(&root, &plain, &temp, None, &cancel).unwrap_err().is_unsupported());
}

#[test]
fn test_flush_removes_extracted_files() {
    let dir = tempfile::tempdir().unwrap();
    let first = common::docs_tar_gz(dir.path(), "first.tar.gz");
    let second = common::docs_tar_gz(dir.path(), "second.tar.gz");
    let temp = dir.path().join("temp");
    let cache = RootNodeCache::new(&EngineConfig::new().cache_threshold(1));
    let cancel = CancellationToken::new();

    let root = cache
        .get_or_build(&first, None, || TreeBuilder::new(&first).build())
        .unwrap();
    let readme = root.file("readme.txt").unwrap().clone();
    let extracted = cache.open_entry(&root, &readme, &temp, &cancel).unwrap();
    assert!(extracted.is_file());

    cache
        .get_or_build(&second, None, || TreeBuilder::new(&second).build())
        .unwrap();
    assert_eq!(cache.len(), 1);
    assert!(!extracted.exists());
    assert!(cache.get(&root.id()).is_none());
}
