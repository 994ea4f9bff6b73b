//! ZIP containers.
//!
//! Entries are written with Deflate and, when a password is set, AES-256.
//! Reading accepts AES and ZipCrypto entries. Entry names are decoded
//! according to [`EntryNameEncoding`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::{
    ArchiveAlgorithm, EntryVisitor, RawEntry, SubsetRun, check_compress_args,
    check_decompress_args, open_archive, resolve_target, write_archive, write_entry,
};
use crate::archive_path;
use crate::archive_type::ArchiveType;
use crate::fs;
use crate::options::{AlgorithmOptions, EntryNameEncoding};
use crate::pipeline::Pipeline;
use crate::tree::ArchiveEntry;
use crate::{Error, Result};

/// ZIP compress/decompress.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipAlgorithm;

type Reader = ZipArchive<BufReader<File>>;

fn open_zip(archive: &Path) -> Result<Reader> {
    ZipArchive::new(BufReader::new(open_archive(archive)?)).map_err(|e| Error::from_zip(archive, e))
}

fn decode_name(raw: &[u8], decoded: &str, encoding: EntryNameEncoding) -> String {
    match encoding {
        EntryNameEncoding::Utf8 => String::from_utf8_lossy(raw).into_owned(),
        EntryNameEncoding::Cp437 => decoded.to_string(),
    }
}

/// Reads an entry's metadata without decrypting it.
fn raw_entry(zip: &mut Reader, index: usize, archive: &Path, encoding: EntryNameEncoding) -> Result<RawEntry> {
    let file = zip
        .by_index_raw(index)
        .map_err(|e| Error::from_zip(archive, e))?;
    Ok(RawEntry {
        path: decode_name(file.name_raw(), file.name(), encoding),
        is_dir: file.is_dir(),
        size: file.size(),
    })
}

fn total_size(zip: &mut Reader, archive: &Path) -> Result<u64> {
    let mut total = 0;
    for index in 0..zip.len() {
        let file = zip
            .by_index_raw(index)
            .map_err(|e| Error::from_zip(archive, e))?;
        total += file.size();
    }
    Ok(total)
}

/// Opens entry `index` for reading, decrypting with `password` if given,
/// and copies it into `target`.
fn extract_index(
    zip: &mut Reader,
    index: usize,
    archive: &Path,
    target: (PathBuf, File),
    pipeline: &mut Pipeline,
    password: Option<&str>,
) -> Result<()> {
    let (path, file) = target;
    let opened = match password {
        Some(password) => zip.by_index_decrypt(index, password.as_bytes()),
        None => zip.by_index(index),
    };
    let mut entry = match opened {
        Ok(entry) => entry,
        Err(e) => {
            drop(file);
            fs::remove_partial(&path);
            return Err(Error::from_zip(archive, e));
        }
    };
    write_entry(pipeline, archive, &mut entry, file, &path)
}

/// Converts a timestamp to a ZIP (MS-DOS) date time.
///
/// Returns `None` outside the representable range (1980–2107).
fn zip_datetime(time: SystemTime) -> Option<DateTime> {
    let secs = fs::unix_secs(time);
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;

    // Days since 1970-01-01 to a proleptic Gregorian date.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    DateTime::from_date_and_time(
        u16::try_from(year).ok()?,
        month as u8,
        day as u8,
        (rem / 3600) as u8,
        ((rem % 3600) / 60) as u8,
        (rem % 60) as u8,
    )
    .ok()
}

fn write_zip(
    out: BufWriter<File>,
    files: &[PathBuf],
    archive: &Path,
    pipeline: &mut Pipeline,
    options: &AlgorithmOptions,
) -> Result<()> {
    let mut zip = ZipWriter::new(out);
    let level = options.level.map(i64::from);

    for path in files {
        pipeline.check_cancelled()?;
        let name = fs::base_name(path)?;
        let mut source = File::open(path).map_err(Error::Io)?;
        let size = source.metadata().map(|m| m.len()).unwrap_or(0);

        let mut entry_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(level)
            .large_file(size >= u64::from(u32::MAX));
        if let Some(modified) = fs::modified_time(path).and_then(zip_datetime) {
            entry_options = entry_options.last_modified_time(modified);
        }

        pipeline.entry_started(&name, size);
        let started = match options.password_str() {
            Some(password) => zip.start_file(
                name.as_str(),
                entry_options.with_aes_encryption(AesMode::Aes256, password),
            ),
            None => zip.start_file(name.as_str(), entry_options),
        };
        started.map_err(|e| Error::from_zip(archive, e))?;
        pipeline
            .copy(&mut source, &mut zip)
            .map_err(|e| Error::from_archive_io(archive, e))?;
        pipeline.entry_completed(&name, true);
    }

    let mut out = zip.finish().map_err(|e| Error::from_zip(archive, e))?;
    out.flush().map_err(Error::Io)
}

impl ArchiveAlgorithm for ZipAlgorithm {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
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
            pipeline.guarded(|p| write_zip(out, files, archive, p, options))
        })
    }

    fn decompress_all(
        &self,
        archive: &Path,
        dest: &Path,
        pipeline: &mut Pipeline,
        options: &AlgorithmOptions,
    ) -> Result<Vec<PathBuf>> {
        check_decompress_args(archive, dest)?;
        let mut zip = open_zip(archive)?;
        pipeline.report_total(total_size(&mut zip, archive)?);

        pipeline.guarded(|p| {
            let mut written = Vec::new();
            for index in 0..zip.len() {
                p.check_cancelled()?;
                let entry = raw_entry(&mut zip, index, archive, options.encoding)?;
                if entry.is_dir {
                    continue;
                }
                let key = archive_path::normalize_key(&entry.path);
                let Some(path) = resolve_target(p, dest, &key) else {
                    continue;
                };
                let file = fs::create_file(&path)?;
                p.entry_started(&key, entry.size);
                let result = extract_index(
                    &mut zip,
                    index,
                    archive,
                    (path.clone(), file),
                    p,
                    options.password_str(),
                );
                p.entry_completed(&key, result.is_ok());
                result?;
                written.push(path);
            }
            Ok(written)
        })
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
        let mut zip = open_zip(archive)?;

        pipeline.guarded(|p| {
            for index in 0..zip.len() {
                if run.matcher.is_done() {
                    break;
                }
                p.check_cancelled()?;
                let entry = raw_entry(&mut zip, index, archive, options.encoding)?;
                let key = archive_path::normalize_key(&entry.path);
                if entry.is_dir || !run.matcher.take(&key) {
                    continue;
                }
                run.extract_with(p, &key, entry.size, |p, target| {
                    extract_index(&mut zip, index, archive, target, p, options.password_str())
                })?;
            }
            Ok(())
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
        let mut zip = open_zip(archive)?;
        for index in 0..zip.len() {
            pipeline.check_cancelled()?;
            visitor(raw_entry(&mut zip, index, archive, options.encoding)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zip_datetime_conversion() {
        // 2021-03-04 05:06:08 UTC
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_614_834_368);
        let dt = zip_datetime(time).unwrap();
        assert_eq!(dt.year(), 2021);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.day(), 4);
        assert_eq!(dt.hour(), 5);
        assert_eq!(dt.minute(), 6);
    }

    #[test]
    fn test_zip_datetime_out_of_range() {
        assert!(zip_datetime(SystemTime::UNIX_EPOCH).is_none());
    }

    #[test]
    fn test_decode_name() {
        assert_eq!(decode_name(b"caf\xc3\xa9", "café", EntryNameEncoding::Utf8), "café");
        assert_eq!(decode_name(b"\x82", "é", EntryNameEncoding::Cp437), "é");
        assert_eq!(decode_name(b"\x82", "é", EntryNameEncoding::Utf8), "\u{fffd}");
    }
}
