//! Partial extraction of selected entries.

mod common;

use std::path::PathBuf;

use arcflow::algorithm::algorithm_for;
use arcflow::pipeline::Pipeline;
use arcflow::{AlgorithmOptions, ArchiveEntry, ArchiveType, TreeBuilder};

fn four_files(archive_type: ArchiveType) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let inputs = common::write_files(
        &dir.path().join("in"),
        &[("A.txt", b"aaaa"), ("B.txt", b"bb"), ("C.txt", b"cccccc"), ("D.txt", b"d")],
    );
    let archive = dir.path().join(format!("four{}", archive_type.extension()));
    common::compress(&inputs, &archive, archive_type);
    (dir, archive)
}

fn extract_a_and_c(archive_type: ArchiveType) {
    let (dir, archive) = four_files(archive_type);
    let out = dir.path().join("out");
    let wanted = vec![ArchiveEntry::file("A.txt", 4), ArchiveEntry::file("C.txt", 6)];

    let names = algorithm_for(archive_type)
        .unwrap()
        .decompress_subset(
            &archive,
            &out,
            &wanted,
            true,
            &mut Pipeline::detached(),
            &AlgorithmOptions::default(),
        )
        .unwrap();

    assert_eq!(names.len(), 2);
    assert_eq!(names["A.txt"], out.join("A.txt"));
    assert_eq!(names["C.txt"], out.join("C.txt"));
    assert_eq!(
        common::read_tree(&out),
        vec![
            ("A.txt".to_string(), b"aaaa".to_vec()),
            ("C.txt".to_string(), b"cccccc".to_vec()),
        ]
    );
}

#[test]
fn test_zip_subset() {
    extract_a_and_c(ArchiveType::Zip);
}

#[test]
fn test_tar_subset() {
    extract_a_and_c(ArchiveType::Tar);
}

#[test]
fn test_tar_gz_subset() {
    extract_a_and_c(ArchiveType::TarGz);
}

#[test]
fn test_tar_lzma_subset() {
    extract_a_and_c(ArchiveType::TarLz);
}

#[test]
fn test_subset_without_collection_returns_empty_map() {
    let (dir, archive) = four_files(ArchiveType::Zip);
    let out = dir.path().join("out");
    let names = algorithm_for(ArchiveType::Zip)
        .unwrap()
        .decompress_subset(
            &archive,
            &out,
            &[ArchiveEntry::file("B.txt", 2)],
            false,
            &mut Pipeline::detached(),
            &AlgorithmOptions::default(),
        )
        .unwrap();
    assert!(names.is_empty());
    assert_eq!(std::fs::read(out.join("B.txt")).unwrap(), b"bb");
}

#[test]
fn test_folder_entry_selects_its_contents() {
    let dir = tempfile::tempdir().unwrap();
    let archive = common::docs_tar_gz(dir.path(), "docs.tar.gz");
    let root = TreeBuilder::new(&archive).build().unwrap();
    let img = match root.find("img") {
        Some(arcflow::ArchiveTreeItem::Node(node)) => node.entry(),
        _ => panic!("img folder missing"),
    };

    let out = dir.path().join("out");
    let names = algorithm_for(ArchiveType::TarGz)
        .unwrap()
        .decompress_subset(
            &archive,
            &out,
            &[img],
            true,
            &mut Pipeline::detached(),
            &AlgorithmOptions::default(),
        )
        .unwrap();

    assert_eq!(names.len(), 1);
    assert_eq!(names["img/logo.png"], out.join("img").join("logo.png"));
    assert!(!out.join("readme.txt").exists());
}

#[test]
fn test_flatten_renames_collisions() {
    let dir = tempfile::tempdir().unwrap();
    let archive = common::zip_with_entries(
        dir.path(),
        "dupes.zip",
        &[("one/note.txt", b"first"), ("two/note.txt", b"second")],
    );
    let out = dir.path().join("out");

    let names = algorithm_for(ArchiveType::Zip)
        .unwrap()
        .decompress_subset(
            &archive,
            &out,
            &[ArchiveEntry::file("one/note.txt", 5), ArchiveEntry::file("two/note.txt", 6)],
            true,
            &mut Pipeline::detached(),
            &AlgorithmOptions::new().flatten(true),
        )
        .unwrap();

    assert_eq!(names["one/note.txt"], out.join("note.txt"));
    assert_eq!(names["two/note.txt"], out.join("note (2).txt"));
    assert_eq!(std::fs::read(out.join("note (2).txt")).unwrap(), b"second");
}

#[test]
fn test_single_file_subset() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = common::write_files(&dir.path().join("in"), &[("log.txt", b"line\n")]);
    let archive = dir.path().join("log.txt.bz2");
    common::compress(&inputs, &archive, ArchiveType::BZip2);

    let out = dir.path().join("out");
    let names = algorithm_for(ArchiveType::BZip2)
        .unwrap()
        .decompress_subset(
            &archive,
            &out,
            &[ArchiveEntry::file("log.txt", 5)],
            true,
            &mut Pipeline::detached(),
            &AlgorithmOptions::default(),
        )
        .unwrap();
    assert_eq!(names["log.txt"], out.join("log.txt"));
}

#[test]
fn test_missing_entries_are_not_fatal() {
    let (dir, archive) = four_files(ArchiveType::Tar);
    let out = dir.path().join("out");
    let names = algorithm_for(ArchiveType::Tar)
        .unwrap()
        .decompress_subset(
            &archive,
            &out,
            &[ArchiveEntry::file("A.txt", 4), ArchiveEntry::file("Z.txt", 1)],
            true,
            &mut Pipeline::detached(),
            &AlgorithmOptions::default(),
        )
        .unwrap();
    assert_eq!(names.len(), 1);
    assert!(names.contains_key("A.txt"));
}
