//! Format-polymorphic compress/decompress algorithms.
//!
//! Every [`ArchiveType`] maps to one [`ArchiveAlgorithm`] implementation,
//! selected once through [`algorithm_for`]:
//!
//! | Type | Implementation | Compress | Decompress |
//! |------|----------------|----------|------------|
//! | Zip | [`ZipAlgorithm`] | yes | yes |
//! | Tar, TarGz, TarBz2, TarLz | [`TarAlgorithm`] | yes | yes |
//! | GZip, BZip2 | [`SingleFileAlgorithm`] | one file | yes |
//! | SevenZip | [`SevenZipAlgorithm`] | no | yes |
//!
//! Shared behavior (chunked copies, cancellation checks, progress batching)
//! lives in [`Pipeline`]; the helpers in this module handle output files.

mod sevenzip;
mod single;
mod tar;
mod zip;

pub use self::sevenzip::SevenZipAlgorithm;
pub use self::single::SingleFileAlgorithm;
pub use self::tar::TarAlgorithm;
pub use self::zip::ZipAlgorithm;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::archive_path;
use crate::archive_type::ArchiveType;
use crate::fs;
use crate::options::AlgorithmOptions;
use crate::pipeline::Pipeline;
use crate::tree::ArchiveEntry;
use crate::{Error, Result};

/// An entry as reported by a container reader, before tree building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Entry path as stored (already decoded to UTF-8).
    pub path: String,
    /// The container marks the entry as a directory.
    pub is_dir: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
}

/// Callback receiving entries in container order.
pub type EntryVisitor<'a> = dyn FnMut(RawEntry) -> Result<()> + 'a;

/// One archive format's compress and decompress operations.
pub trait ArchiveAlgorithm: Send + Sync {
    /// The type handled by this implementation.
    fn archive_type(&self) -> ArchiveType;

    /// Writes `files` into a new archive at `archive`.
    ///
    /// Each file becomes one entry named by its base name. An empty file list
    /// is a no-op. If the call fails or is cancelled the archive is deleted.
    fn compress(
        &self,
        files: &[PathBuf],
        archive: &Path,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<()>;

    /// Extracts every file entry under `dest`, preserving relative paths.
    ///
    /// Returns the files written. Entries written before a failure or
    /// cancellation stay on disk.
    fn decompress_all(
        &self,
        archive: &Path,
        dest: &Path,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<Vec<PathBuf>>;

    /// Extracts only the requested entries.
    ///
    /// The container is scanned once and the scan stops as soon as every
    /// requested file key was matched. Folder entries select everything
    /// below them. With `collect_file_names`, the returned map holds the
    /// on-disk path of every extracted key; otherwise it is empty.
    fn decompress_subset(
        &self,
        archive: &Path,
        dest: &Path,
        entries: &[ArchiveEntry],
        collect_file_names: bool,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<HashMap<String, PathBuf>>;

    /// Enumerates entries in container order without extracting.
    fn read_entries(
        &self,
        archive: &Path,
        options: &AlgorithmOptions,
        pipeline: &mut Pipeline,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<()>;
}

/// Returns the algorithm for `archive_type`.
///
/// # Errors
///
/// [`Error::UnsupportedFormat`] for [`ArchiveType::Unknown`].
pub fn algorithm_for(archive_type: ArchiveType) -> Result<Box<dyn ArchiveAlgorithm>> {
    Ok(match archive_type {
        ArchiveType::Zip => Box::new(ZipAlgorithm),
        ArchiveType::Tar | ArchiveType::TarGz | ArchiveType::TarBz2 | ArchiveType::TarLz => {
            Box::new(TarAlgorithm::new(archive_type)?)
        }
        ArchiveType::GZip | ArchiveType::BZip2 => {
            Box::new(SingleFileAlgorithm::new(archive_type)?)
        }
        ArchiveType::SevenZip => Box::new(SevenZipAlgorithm),
        ArchiveType::Unknown => {
            return Err(Error::unsupported_format(
                archive_type,
                "unrecognized archive extension",
            ));
        }
    })
}

/// Checks the common compress preconditions.
///
/// Returns `false` when there is nothing to do.
pub(crate) fn check_compress_args(files: &[PathBuf], archive: &Path) -> Result<bool> {
    if archive.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("destination archive is missing".into()));
    }
    if files.is_empty() {
        log::debug!("Nothing to compress into '{}'", archive.display());
        return Ok(false);
    }
    Ok(true)
}

/// Checks the common decompress preconditions.
pub(crate) fn check_decompress_args(archive: &Path, dest: &Path) -> Result<()> {
    if archive.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("source archive is missing".into()));
    }
    if dest.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("destination folder is missing".into()));
    }
    Ok(())
}

/// Creates the archive file, runs `write` against it and deletes the file
/// if writing fails.
pub(crate) fn write_archive(
    archive: &Path,
    write: impl FnOnce(BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let file = fs::create_file(archive)?;
    let result = write(BufWriter::new(file));
    if let Err(e) = &result {
        if e.is_cancelled() {
            log::info!("Compression cancelled, removing '{}'", archive.display());
        }
        fs::remove_partial(archive);
    }
    result
}

/// Opens an archive for reading.
pub(crate) fn open_archive(archive: &Path) -> Result<File> {
    File::open(archive).map_err(Error::Io)
}

/// Copies one entry's data into `file` at `path`.
///
/// A partially written file is removed on failure; files completed earlier
/// are never touched.
pub(crate) fn write_entry(
    pipeline: &mut Pipeline,
    archive: &Path,
    reader: &mut dyn Read,
    file: File,
    path: &Path,
) -> Result<()> {
    let mut writer = BufWriter::new(file);
    let result = pipeline
        .copy(reader, &mut writer)
        .and_then(|_| writer.flush());
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(writer);
            fs::remove_partial(path);
            Err(Error::from_archive_io(archive, e))
        }
    }
}

/// Resolves where a whole-archive entry is written.
///
/// Returns `None` (and logs) for keys that would escape `dest`.
pub(crate) fn resolve_target(pipeline: &mut Pipeline, dest: &Path, key: &str) -> Option<PathBuf> {
    match archive_path::to_relative_path(key) {
        Some(relative) => Some(dest.join(relative)),
        None => {
            pipeline.warn(&format!("Skipping entry with unsafe path '{}'", key));
            None
        }
    }
}

/// Opens the output file for a subset entry, either at its relative path or
/// flattened to its base name. Existing files are never overwritten; the
/// new file is renamed on collision instead.
pub(crate) fn open_target(
    pipeline: &mut Pipeline,
    dest: &Path,
    key: &str,
    flatten: bool,
) -> Result<Option<(PathBuf, File)>> {
    if flatten {
        let name = archive_path::file_name(key);
        return fs::create_unique_file(dest, name).map(Some);
    }
    let Some(path) = resolve_target(pipeline, dest, key) else {
        return Ok(None);
    };
    let parent = path.parent().unwrap_or(dest);
    fs::create_unique_file(parent, archive_path::file_name(key)).map(Some)
}

/// Matches container keys against a requested entry subset.
#[derive(Debug)]
pub(crate) struct SubsetMatcher {
    pending: HashSet<String>,
    prefixes: Vec<String>,
}

impl SubsetMatcher {
    pub(crate) fn new(entries: &[ArchiveEntry]) -> Self {
        let mut pending = HashSet::new();
        let mut prefixes = Vec::new();
        for entry in entries {
            let key = archive_path::normalize_key(&entry.key);
            if entry.is_folder() {
                prefixes.push(format!("{key}{}", archive_path::SEPARATOR));
            } else {
                pending.insert(key);
            }
        }
        Self { pending, prefixes }
    }

    /// Returns true (once) if the normalized key was requested.
    pub(crate) fn take(&mut self, key: &str) -> bool {
        if self.pending.remove(key) {
            return true;
        }
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// True when no further entry can match.
    pub(crate) fn is_done(&self) -> bool {
        self.pending.is_empty() && self.prefixes.is_empty()
    }

    /// Number of file keys requested but not found.
    pub(crate) fn missing(&self) -> usize {
        self.pending.len()
    }
}

/// Per-call bookkeeping for subset extraction.
pub(crate) struct SubsetRun<'a> {
    pub(crate) matcher: SubsetMatcher,
    pub(crate) dest: &'a Path,
    pub(crate) flatten: bool,
    pub(crate) collect: bool,
    pub(crate) names: HashMap<String, PathBuf>,
}

impl<'a> SubsetRun<'a> {
    pub(crate) fn new(
        entries: &[ArchiveEntry],
        dest: &'a Path,
        collect: bool,
        options: &AlgorithmOptions,
    ) -> Self {
        Self {
            matcher: SubsetMatcher::new(entries),
            dest,
            flatten: options.flatten,
            collect,
            names: HashMap::new(),
        }
    }

    /// Extracts one matched entry and records its name.
    pub(crate) fn extract(
        &mut self,
        pipeline: &mut Pipeline,
        archive: &Path,
        key: &str,
        size: u64,
        reader: &mut dyn Read,
    ) -> Result<Option<PathBuf>> {
        self.extract_with(pipeline, key, size, |p, (path, file)| {
            write_entry(p, archive, reader, file, &path)
        })
    }

    /// Opens the target for a matched entry and hands it to `write`.
    ///
    /// `write` owns the file and must remove it if it fails.
    pub(crate) fn extract_with(
        &mut self,
        pipeline: &mut Pipeline,
        key: &str,
        size: u64,
        write: impl FnOnce(&mut Pipeline, (PathBuf, File)) -> Result<()>,
    ) -> Result<Option<PathBuf>> {
        let Some((path, file)) = open_target(pipeline, self.dest, key, self.flatten)? else {
            return Ok(None);
        };
        pipeline.entry_started(key, size);
        let result = write(pipeline, (path.clone(), file));
        pipeline.entry_completed(key, result.is_ok());
        result?;
        if self.collect {
            self.names.insert(key.to_string(), path.clone());
        }
        Ok(Some(path))
    }

    pub(crate) fn finish(self, archive: &Path) -> HashMap<String, PathBuf> {
        if self.matcher.missing() > 0 {
            log::warn!(
                "{} requested entries not found in '{}'",
                self.matcher.missing(),
                archive.display()
            );
        }
        self.names
    }
}
