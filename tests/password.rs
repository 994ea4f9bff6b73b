//! Encrypted archives and password retry.

mod common;

use std::sync::{Arc, Mutex};

use arcflow::algorithm::algorithm_for;
use arcflow::pipeline::Pipeline;
use arcflow::{
    AlgorithmOptions, ArchiveType, Error, Operation, OperationInfo, OperationStatus, TreeBuilder,
};

fn encrypted_zip(dir: &std::path::Path) -> std::path::PathBuf {
    let files = common::write_files(&dir.join("in"), &[("secret.txt", b"top secret")]);
    let archive = dir.join("secret.zip");
    common::compress_with(
        &files,
        &archive,
        ArchiveType::Zip,
        &AlgorithmOptions::new().password("hunter2"),
    );
    archive
}

#[test]
fn test_missing_password_is_reported_as_encrypted() {
    let dir = tempfile::tempdir().unwrap();
    let archive = encrypted_zip(dir.path());

    let err = algorithm_for(ArchiveType::Zip)
        .unwrap()
        .decompress_all(
            &archive,
            &dir.path().join("out"),
            &mut Pipeline::detached(),
            &AlgorithmOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::EncryptedArchive { .. }), "{err:?}");
    assert!(!dir.path().join("out").join("secret.txt").exists());
}

#[test]
fn test_wrong_password_is_reported_as_encrypted() {
    let dir = tempfile::tempdir().unwrap();
    let archive = encrypted_zip(dir.path());

    let err = algorithm_for(ArchiveType::Zip)
        .unwrap()
        .decompress_all(
            &archive,
            &dir.path().join("out"),
            &mut Pipeline::detached(),
            &AlgorithmOptions::new().password("wrong"),
        )
        .unwrap_err();
    assert!(err.is_encryption_error(), "{err:?}");
}

#[test]
fn test_correct_password_extracts() {
    let dir = tempfile::tempdir().unwrap();
    let archive = encrypted_zip(dir.path());
    let out = dir.path().join("out");

    algorithm_for(ArchiveType::Zip)
        .unwrap()
        .decompress_all(
            &archive,
            &out,
            &mut Pipeline::detached(),
            &AlgorithmOptions::new().password("hunter2"),
        )
        .unwrap();
    assert_eq!(std::fs::read(out.join("secret.txt")).unwrap(), b"top secret");
}

#[test]
fn test_tree_of_encrypted_zip_lists_names() {
    let dir = tempfile::tempdir().unwrap();
    let archive = encrypted_zip(dir.path());
    let root = TreeBuilder::new(&archive).build().unwrap();
    assert_eq!(root.node().keys(), vec!["secret.txt"]);
}

#[test]
fn test_operation_asks_once_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let archive = encrypted_zip(dir.path());
    let out = dir.path().join("out");

    let asked = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&asked);
    let result = Operation::new(OperationInfo::decompress(&archive, &out))
        .password_provider(move |name: &str| {
            log.lock().unwrap().push(name.to_string());
            Some("hunter2".to_string())
        })
        .run();

    assert_eq!(result.status, OperationStatus::Success, "{}", result.message);
    assert_eq!(*asked.lock().unwrap(), vec!["secret.zip".to_string()]);
    assert_eq!(result.archive_names, vec!["secret".to_string()]);
    assert_eq!(std::fs::read(out.join("secret").join("secret.txt")).unwrap(), b"top secret");
}

#[test]
fn test_operation_without_password_fails() {
    let dir = tempfile::tempdir().unwrap();
    let archive = encrypted_zip(dir.path());
    let out = dir.path().join("out");

    let result = Operation::new(OperationInfo::decompress(&archive, &out)).run();
    assert_eq!(result.status, OperationStatus::Fail);
    assert!(result.verbose_message.unwrap().contains("EncryptedArchive"));
    // The empty extraction folder is removed again.
    assert!(!out.join("secret").exists());
}

#[test]
fn test_seven_zip_password() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    common::write_files(&src, &[("hidden.txt", b"7z secret")]);
    let archive = dir.path().join("locked.7z");
    sevenz_rust::compress_to_path_encrypted(&src, &archive, "pw".into()).unwrap();

    let out = dir.path().join("out");
    let err = algorithm_for(ArchiveType::SevenZip)
        .unwrap()
        .decompress_all(&archive, &out, &mut Pipeline::detached(), &AlgorithmOptions::default())
        .unwrap_err();
    assert!(err.is_encryption_error(), "{err:?}");

    let written = algorithm_for(ArchiveType::SevenZip)
        .unwrap()
        .decompress_all(
            &archive,
            &out,
            &mut Pipeline::detached(),
            &AlgorithmOptions::new().password("pw"),
        )
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"7z secret");
}
