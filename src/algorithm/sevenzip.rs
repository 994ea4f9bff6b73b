//! 7-Zip containers (read-only).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader};

use super::{
    ArchiveAlgorithm, EntryVisitor, RawEntry, SubsetRun, check_decompress_args, resolve_target,
    write_entry,
};
use crate::archive_path;
use crate::archive_type::ArchiveType;
use crate::fs;
use crate::options::AlgorithmOptions;
use crate::pipeline::Pipeline;
use crate::tree::ArchiveEntry;
use crate::{Error, Result};

/// 7z decompression. Compression fails with [`Error::UnsupportedFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZipAlgorithm;

fn open_reader(archive: &Path, options: &AlgorithmOptions) -> Result<SevenZReader<File>> {
    let password = options
        .password_str()
        .map(Password::from)
        .unwrap_or_else(Password::empty);
    SevenZReader::open(archive, password).map_err(|e| Error::from_sevenz(archive, e))
}

/// Discards the rest of an entry's stream, checking for cancellation on
/// every buffer.
fn drain(pipeline: &mut Pipeline, archive: &Path, data: &mut dyn Read) -> Result<()> {
    pipeline
        .measure(data)
        .map(|_| ())
        .map_err(|e| Error::from_archive_io(archive, e))
}

/// Runs `visit` over every entry in archive order.
///
/// The library callback can only return its own error type, so engine
/// errors are parked in `failure` and the walk is stopped.
fn scan(
    archive: &Path,
    options: &AlgorithmOptions,
    pipeline: &mut Pipeline,
    mut visit: impl FnMut(&mut Pipeline, &SevenZArchiveEntry, &mut dyn Read) -> Result<bool>,
) -> Result<()> {
    let mut reader = open_reader(archive, options)?;
    let mut failure = None;
    let outcome = reader.for_each_entries(|entry, data| {
        let step = pipeline
            .check_cancelled()
            .and_then(|()| visit(pipeline, entry, data));
        match step {
            Ok(more) => Ok(more),
            Err(e) => {
                failure = Some(e);
                Ok(false)
            }
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    outcome.map_err(|e| Error::from_sevenz(archive, e))
}

impl ArchiveAlgorithm for SevenZipAlgorithm {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::SevenZip
    }

    fn compress(
        &self,
        _files: &[PathBuf],
        _archive: &Path,
        _pipeline: &mut Pipeline,
        _options: &AlgorithmOptions,
    ) -> Result<()> {
        Err(Error::unsupported_format(
            ArchiveType::SevenZip,
            "7z archives can only be decompressed",
        ))
    }

    fn decompress_all(
        &self,
        archive: &Path,
        dest: &Path,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<Vec<PathBuf>> {
        check_decompress_args(archive, dest)?;
        let mut written = Vec::new();
        pipeline.guarded(|p| {
            scan(archive, options, p, |p, entry, data| {
                if entry.is_directory() {
                    return Ok(true);
                }
                let key = archive_path::normalize_key(entry.name());
                let Some(path) = resolve_target(p, dest, &key) else {
                    drain(p, archive, data)?;
                    return Ok(true);
                };
                let file = fs::create_file(&path)?;
                p.entry_started(&key, entry.size());
                let result = write_entry(p, archive, data, file, &path);
                p.entry_completed(&key, result.is_ok());
                result?;
                written.push(path);
                Ok(true)
            })
        })?;
        Ok(written)
    }

    fn decompress_subset(
        &self,
        archive: &Path,
        dest: &Path,
        entries: &[ArchiveEntry],
        collect_file_names: bool,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<HashMap<String, PathBuf>> {
        check_decompress_args(archive, dest)?;
        let mut run = SubsetRun::new(entries, dest, collect_file_names, options);
        if run.matcher.is_done() {
            return Ok(run.finish(archive));
        }
        pipeline.guarded(|p| {
            scan(archive, options, p, |p, entry, data| {
                let key = archive_path::normalize_key(entry.name());
                if entry.is_directory() || !run.matcher.take(&key) {
                    drain(p, archive, data)?;
                    return Ok(true);
                }
                run.extract(p, archive, &key, entry.size(), data)?;
                Ok(!run.matcher.is_done())
            })
        })?;
        Ok(run.finish(archive))
    }

    fn read_entries(
        &self,
        archive: &Path,
        options: &AlgorithmOptions,
        pipeline: &mut Pipeline,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<()> {
        let reader = open_reader(archive, options)?;
        for entry in &reader.archive().files {
            pipeline.check_cancelled()?;
            visitor(RawEntry {
                path: entry.name().to_string(),
                is_dir: entry.is_directory(),
                size: entry.size(),
            })?;
        }
        Ok(())
    }
}
