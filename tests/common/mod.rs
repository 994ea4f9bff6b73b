//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use arcflow::algorithm::algorithm_for;
use arcflow::pipeline::Pipeline;
use arcflow::{AlgorithmOptions, ArchiveType};

/// Deterministic, mildly compressible payload of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31) % 251) as u8).collect()
}

/// Writes `(name, data)` pairs into `dir` and returns their paths in order.
pub fn write_files(dir: &Path, files: &[(&str, &[u8])]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    files
        .iter()
        .map(|(name, data)| {
            let path = dir.join(name);
            std::fs::write(&path, data).unwrap();
            path
        })
        .collect()
}

/// Compresses `files` into `archive` with default options.
pub fn compress(files: &[PathBuf], archive: &Path, archive_type: ArchiveType) {
    compress_with(files, archive, archive_type, &AlgorithmOptions::default());
}

/// Compresses `files` into `archive` with `options`.
pub fn compress_with(
    files: &[PathBuf],
    archive: &Path,
    archive_type: ArchiveType,
    options: &AlgorithmOptions,
) {
    algorithm_for(archive_type)
        .unwrap()
        .compress(files, archive, &mut Pipeline::detached(), options)
        .unwrap();
}

/// Builds `<dir>/<name>` as a TAR+GZip archive holding `readme.txt`
/// (12 bytes) and `img/logo.png` (500 bytes).
///
/// The archive is written with the `tar` and `flate2` crates directly so
/// the folder layout does not depend on the engine's own writer.
pub fn docs_tar_gz(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(gz);

    let mut folder = tar::Header::new_gnu();
    folder.set_entry_type(tar::EntryType::Directory);
    folder.set_size(0);
    folder.set_mode(0o755);
    builder.append_data(&mut folder, "img/", std::io::empty()).unwrap();

    append(&mut builder, "readme.txt", b"hello world!");
    append(&mut builder, "img/logo.png", &pattern(500));

    builder.into_inner().unwrap().finish().unwrap();
    path
}

fn append<W: std::io::Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, data).unwrap();
}

/// Builds a ZIP archive with the given `(key, data)` entries using the `zip`
/// crate directly; keys ending in `/` become folder entries.
pub fn zip_with_entries(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (key, data) in entries {
        if key.ends_with('/') {
            zip.add_directory(*key, SimpleFileOptions::default()).unwrap();
        } else {
            zip.start_file(*key, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
    path
}

/// Reads every file below `dir` as `(relative path, contents)`, sorted.
pub fn read_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    fn visit(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                let rel = path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                out.push((rel, std::fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    visit(dir, dir, &mut out);
    out.sort();
    out
}
