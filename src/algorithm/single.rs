//! Single-file compressors: GZIP and BZIP2.
//!
//! These formats hold exactly one payload. Gzip archives record the
//! original file name and modification time in their header; when the
//! header has no name (and always for bzip2) the payload is named after the
//! archive with its extension stripped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::GzBuilder;
use flate2::read::MultiGzDecoder;

use super::{
    ArchiveAlgorithm, EntryVisitor, RawEntry, SubsetRun, check_compress_args,
    check_decompress_args, open_archive, resolve_target, write_archive, write_entry,
};
use crate::archive_path;
use crate::archive_type::ArchiveType;
use crate::fs;
use crate::options::AlgorithmOptions;
use crate::pipeline::Pipeline;
use crate::tree::ArchiveEntry;
use crate::{Error, Result};

const DEFAULT_LEVEL: u32 = 6;

/// Smallest well-formed gzip member: 10-byte header plus 8-byte trailer.
const GZIP_MIN_LEN: u64 = 18;

/// GZip or BZip2 compress/decompress.
#[derive(Debug, Clone, Copy)]
pub struct SingleFileAlgorithm {
    archive_type: ArchiveType,
}

/// An opened single-file archive.
struct Payload {
    reader: Box<dyn Read>,
    name: String,
    mtime: Option<u64>,
}

impl SingleFileAlgorithm {
    /// Creates the algorithm for [`ArchiveType::GZip`] or [`ArchiveType::BZip2`].
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] for any other type.
    pub fn new(archive_type: ArchiveType) -> Result<Self> {
        if !archive_type.is_single_file() {
            return Err(Error::unsupported_format(
                archive_type,
                "not a single-file format",
            ));
        }
        Ok(Self { archive_type })
    }

    fn open(&self, archive: &Path) -> Result<Payload> {
        let reader = BufReader::new(open_archive(archive)?);
        let fallback = ArchiveType::strip_extension(&fs::base_name(archive)?).to_string();
        if self.archive_type == ArchiveType::BZip2 {
            return Ok(Payload {
                reader: Box::new(MultiBzDecoder::new(reader)),
                name: fallback,
                mtime: None,
            });
        }

        let decoder = MultiGzDecoder::new(reader);
        let (name, mtime) = match decoder.header() {
            Some(header) => (
                header.filename().map(header_name).filter(|n| !n.is_empty()),
                Some(u64::from(header.mtime())).filter(|&t| t != 0),
            ),
            None => (None, None),
        };
        Ok(Payload {
            reader: Box::new(decoder),
            name: name.unwrap_or(fallback),
            mtime,
        })
    }

    fn payload_size(&self, archive: &Path, payload: &mut Payload, pipeline: &mut Pipeline) -> Result<u64> {
        match self.archive_type {
            ArchiveType::GZip => gzip_isize(archive),
            _ => pipeline
                .measure(&mut payload.reader)
                .map_err(|e| Error::from_archive_io(archive, e)),
        }
    }

    fn extract_to(
        &self,
        archive: &Path,
        mut payload: Payload,
        target: (PathBuf, File),
        pipeline: &mut Pipeline,
    ) -> Result<PathBuf> {
        let (path, file) = target;
        pipeline.entry_started(&payload.name, 0);
        let result = write_entry(pipeline, archive, &mut payload.reader, file, &path);
        pipeline.entry_completed(&payload.name, result.is_ok());
        result?;
        if let Some(mtime) = payload.mtime {
            fs::apply_mtime(&path, mtime);
        }
        Ok(path)
    }
}

/// Reduces a header file name to a safe base name.
fn header_name(raw: &[u8]) -> String {
    let key = archive_path::normalize_key(&String::from_utf8_lossy(raw));
    archive_path::file_name(&key).to_string()
}

/// Reads the uncompressed size from the gzip trailer (ISIZE, modulo 2^32).
fn gzip_isize(archive: &Path) -> Result<u64> {
    let mut file = open_archive(archive)?;
    let len = file.metadata().map_err(Error::Io)?.len();
    if len < GZIP_MIN_LEN {
        return Ok(0);
    }
    let mut trailer = [0u8; 4];
    file.seek(SeekFrom::End(-4)).map_err(Error::Io)?;
    file.read_exact(&mut trailer).map_err(Error::Io)?;
    Ok(u64::from(u32::from_le_bytes(trailer)))
}

fn write_single(
    out: impl Write,
    archive_type: ArchiveType,
    source_path: &Path,
    archive: &Path,
    pipeline: &mut Pipeline,
    options: &AlgorithmOptions,
) -> Result<()> {
    let name = fs::base_name(source_path)?;
    let mut source = File::open(source_path).map_err(Error::Io)?;
    let size = source.metadata().map_err(Error::Io)?.len();
    let level = options.level_or(DEFAULT_LEVEL);
    let to_error = |e: std::io::Error| Error::from_archive_io(archive, e);

    pipeline.entry_started(&name, size);
    let mut out = match archive_type {
        ArchiveType::GZip => {
            let mtime = fs::modified_time(source_path).map(fs::unix_secs).unwrap_or(0);
            let mut encoder = GzBuilder::new()
                .filename(name.as_bytes())
                .mtime(u32::try_from(mtime).unwrap_or(0))
                .write(out, flate2::Compression::new(level));
            pipeline.copy(&mut source, &mut encoder).map_err(to_error)?;
            encoder.finish().map_err(to_error)?
        }
        _ => {
            let mut encoder = BzEncoder::new(out, bzip2::Compression::new(level.max(1)));
            pipeline.copy(&mut source, &mut encoder).map_err(to_error)?;
            encoder.finish().map_err(to_error)?
        }
    };
    out.flush().map_err(Error::Io)?;
    pipeline.entry_completed(&name, true);
    Ok(())
}

impl ArchiveAlgorithm for SingleFileAlgorithm {
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
        let [source] = files else {
            return Err(Error::InvalidArgument(format!(
                "{} holds a single file, got {}",
                self.archive_type,
                files.len()
            )));
        };
        pipeline.report_total(fs::total_size(files));
        write_archive(archive, |out| {
            pipeline.guarded(|p| write_single(out, self.archive_type, source, archive, p, options))
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
        let payload = self.open(archive)?;
        if self.archive_type == ArchiveType::GZip {
            pipeline.report_total(gzip_isize(archive)?);
        }
        let Some(path) = resolve_target(pipeline, dest, &payload.name) else {
            return Ok(Vec::new());
        };
        let file = fs::create_file(&path)?;
        let path = pipeline.guarded(|p| self.extract_to(archive, payload, (path, file), p))?;
        Ok(vec![path])
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
        let mut payload = self.open(archive)?;
        let key = archive_path::normalize_key(&payload.name);
        if !run.matcher.take(&key) {
            return Ok(run.finish(archive));
        }
        let name = payload.name.clone();
        pipeline.guarded(|p| {
            let mtime = payload.mtime;
            if let Some(path) = run.extract(p, archive, &name, 0, &mut payload.reader)? {
                if let Some(mtime) = mtime {
                    fs::apply_mtime(&path, mtime);
                }
            }
            Ok(())
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
        pipeline.check_cancelled()?;
        let mut payload = self.open(archive)?;
        let size = self.payload_size(archive, &mut payload, pipeline)?;
        visitor(RawEntry {
            path: payload.name,
            is_dir: false,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress_one(archive_type: ArchiveType, name: &str, data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join(name);
        std::fs::write(&source, data).unwrap();
        let archive = dir.path().join(format!("packed{}", archive_type.extension()));
        SingleFileAlgorithm::new(archive_type)
            .unwrap()
            .compress(&[source], &archive, &mut Pipeline::detached(), &AlgorithmOptions::default())
            .unwrap();
        (dir, archive)
    }

    #[test]
    fn test_rejects_multiple_files() {
        let algorithm = SingleFileAlgorithm::new(ArchiveType::GZip).unwrap();
        let err = algorithm
            .compress(
                &[PathBuf::from("a"), PathBuf::from("b")],
                Path::new("out.gz"),
                &mut Pipeline::detached(),
                &AlgorithmOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_gzip_header_name_and_size() {
        let (_dir, archive) = compress_one(ArchiveType::GZip, "notes.txt", &[b'x'; 1234]);
        let algorithm = SingleFileAlgorithm::new(ArchiveType::GZip).unwrap();
        let mut seen = Vec::new();
        algorithm
            .read_entries(&archive, &AlgorithmOptions::default(), &mut Pipeline::detached(), &mut |e| {
                seen.push(e);
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![RawEntry {
                path: "notes.txt".into(),
                is_dir: false,
                size: 1234
            }]
        );
    }

    #[test]
    fn test_bzip2_name_from_archive() {
        let (dir, archive) = compress_one(ArchiveType::BZip2, "notes.txt", b"payload");
        let algorithm = SingleFileAlgorithm::new(ArchiveType::BZip2).unwrap();
        let out = dir.path().join("out");
        let written = algorithm
            .decompress_all(&archive, &out, &mut Pipeline::detached(), &AlgorithmOptions::default())
            .unwrap();
        assert_eq!(written, vec![out.join("packed")]);
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"payload");
    }

    #[test]
    fn test_header_name_strips_directories() {
        assert_eq!(header_name(b"../../etc/passwd"), "passwd");
        assert_eq!(header_name(b"plain.txt"), "plain.txt");
    }
}
