//! TAR containers, optionally wrapped in gzip, bzip2 or LZMA.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use super::{
    ArchiveAlgorithm, EntryVisitor, RawEntry, SubsetRun, check_compress_args,
    check_decompress_args, open_archive, resolve_target, write_archive, write_entry,
};
use crate::archive_path;
use crate::archive_type::ArchiveType;
use crate::fs;
use crate::options::AlgorithmOptions;
use crate::pipeline::{Compressor, Decoder, Pipeline};
use crate::tree::ArchiveEntry;
use crate::{Error, Result};

/// Permission bits written for every file entry.
const FILE_MODE: u32 = 0o644;

/// TAR family compress/decompress.
#[derive(Debug, Clone, Copy)]
pub struct TarAlgorithm {
    archive_type: ArchiveType,
    compressor: Compressor,
}

impl TarAlgorithm {
    /// Creates the algorithm for a TAR-family type.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] if `archive_type` is not a TAR type.
    pub fn new(archive_type: ArchiveType) -> Result<Self> {
        let compressor = Compressor::for_type(archive_type)
            .ok_or_else(|| Error::unsupported_format(archive_type, "not a TAR format"))?;
        Ok(Self {
            archive_type,
            compressor,
        })
    }

    fn open(&self, archive: &Path) -> Result<tar::Archive<Decoder<BufReader<File>>>> {
        let reader = BufReader::new(open_archive(archive)?);
        let decoder = self
            .compressor
            .decoder(reader)
            .map_err(|e| Error::from_archive_io(archive, e))?;
        Ok(tar::Archive::new(decoder))
    }

    /// Walks file and folder entries, handing each one to `visit` together
    /// with its normalized metadata. `visit` returns `false` to stop.
    fn scan(
        &self,
        archive: &Path,
        pipeline: &mut Pipeline,
        mut visit: impl FnMut(&mut Pipeline, &mut tar::Entry<'_, Decoder<BufReader<File>>>, EntryMeta) -> Result<bool>,
    ) -> Result<()> {
        let mut tar = self.open(archive)?;
        let entries = tar
            .entries()
            .map_err(|e| Error::from_archive_io(archive, e))?;
        for entry in entries {
            pipeline.check_cancelled()?;
            let mut entry = entry.map_err(|e| Error::from_archive_io(archive, e))?;
            let entry_type = entry.header().entry_type();
            if !entry_type.is_file() && !entry_type.is_dir() {
                log::debug!("Skipping TAR entry of type {:?}", entry_type);
                continue;
            }
            let raw = entry
                .path()
                .map_err(|e| Error::from_archive_io(archive, e))?
                .to_string_lossy()
                .into_owned();
            let meta = EntryMeta {
                key: archive_path::normalize_key(&raw),
                raw,
                is_dir: entry_type.is_dir(),
                size: entry.size(),
                mtime: entry.header().mtime().ok(),
            };
            if !visit(pipeline, &mut entry, meta)? {
                break;
            }
        }
        Ok(())
    }
}

struct EntryMeta {
    raw: String,
    key: String,
    is_dir: bool,
    size: u64,
    mtime: Option<u64>,
}

fn write_tar(
    out: impl Write,
    compressor: Compressor,
    files: &[PathBuf],
    archive: &Path,
    pipeline: &mut Pipeline,
    options: &AlgorithmOptions,
) -> Result<()> {
    let encoder = compressor.encoder(out, options.level).map_err(Error::Io)?;
    let mut builder = tar::Builder::new(encoder);

    for path in files {
        pipeline.check_cancelled()?;
        let name = fs::base_name(path)?;
        let source = File::open(path).map_err(Error::Io)?;
        let size = source.metadata().map_err(Error::Io)?.len();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(size);
        header.set_mode(FILE_MODE);
        header.set_mtime(fs::modified_time(path).map(fs::unix_secs).unwrap_or(0));
        header.set_device_major(0).map_err(Error::Io)?;
        header.set_device_minor(0).map_err(Error::Io)?;

        pipeline.entry_started(&name, size);
        builder
            .append_data(&mut header, &name, pipeline.observe(source))
            .map_err(|e| Error::from_archive_io(archive, e))?;
        pipeline.entry_completed(&name, true);
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::from_archive_io(archive, e))?;
    let mut out = encoder.finish().map_err(Error::Io)?;
    out.flush().map_err(Error::Io)
}

impl ArchiveAlgorithm for TarAlgorithm {
    fn archive_type(&self) -> ArchiveType {
        self.archive_type
    }

    fn compress(
        &self,
        files: &[PathBuf],
        archive: &Path,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<()> {
        if !check_compress_args(files, archive)? {
            return Ok(());
        }
        pipeline.report_total(fs::total_size(files));
        write_archive(archive, |out| {
            pipeline.guarded(|p| write_tar(out, self.compressor, files, archive, p, options))
        })
    }

    fn decompress_all(
        &self,
        archive: &Path,
        dest: &Path,
        pipeline: &mut Pipeline,
        _options: &AlgorithmOptions,
    ) -> Result<Vec<PathBuf>> {
        check_decompress_args(archive, dest)?;
        let mut written = Vec::new();
        pipeline.guarded(|p| {
            self.scan(archive, p, |p, entry, meta| {
                if meta.is_dir {
                    return Ok(true);
                }
                let Some(path) = resolve_target(p, dest, &meta.key) else {
                    return Ok(true);
                };
                let file = fs::create_file(&path)?;
                p.entry_started(&meta.key, meta.size);
                let result = write_entry(p, archive, entry, file, &path);
                p.entry_completed(&meta.key, result.is_ok());
                result?;
                if let Some(mtime) = meta.mtime {
                    fs::apply_mtime(&path, mtime);
                }
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
            self.scan(archive, p, |p, entry, meta| {
                if meta.is_dir || !run.matcher.take(&meta.key) {
                    return Ok(true);
                }
                let reader: &mut dyn Read = entry;
                if let Some(path) = run.extract(p, archive, &meta.key, meta.size, reader)? {
                    if let Some(mtime) = meta.mtime {
                        fs::apply_mtime(&path, mtime);
                    }
                }
                Ok(!run.matcher.is_done())
            })
        })?;
        Ok(run.finish(archive))
    }

    fn read_entries(
        &self,
        archive: &Path,
        _options: &AlgorithmOptions,
        pipeline: &mut Pipeline,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<()> {
        self.scan(archive, pipeline, |_, _, meta| {
            visitor(RawEntry {
                path: meta.raw,
                is_dir: meta.is_dir,
                size: meta.size,
            })?;
            Ok(true)
        })
    }
}
