//! Storage-handle helpers.
//!
//! The engine talks to the filesystem through a handful of operations:
//! create a file or folder under a unique (collision-renamed) name, take a
//! path's base name, and total up input sizes. Collisions are resolved the
//! way desktop shells do it, by inserting ` (2)`, ` (3)`, ... before the
//! extension.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::archive_type::ArchiveType;
use crate::{Error, Result};

/// Upper bound on collision suffixes tried before giving up.
const MAX_COLLISION_ATTEMPTS: u32 = 10_000;

/// Splits a file name into stem and extension, keeping archive extensions
/// like `.tar.gz` whole.
fn split_name(name: &str) -> (&str, &str) {
    let stem = ArchiveType::strip_extension(name);
    if stem.len() != name.len() {
        return (stem, &name[stem.len()..]);
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Returns the candidate name for the given collision attempt.
///
/// ```
/// use arcflow::fs::candidate_name;
///
/// assert_eq!(candidate_name("notes.txt", 1), "notes.txt");
/// assert_eq!(candidate_name("notes.txt", 2), "notes (2).txt");
/// assert_eq!(candidate_name("docs.tar.gz", 3), "docs (3).tar.gz");
/// ```
pub fn candidate_name(name: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return name.to_string();
    }
    let (stem, ext) = split_name(name);
    format!("{stem} ({attempt}){ext}")
}

/// Creates a new file in `dir`, renaming on collision.
///
/// The file is opened with `create_new`, so two callers racing for the same
/// name never share a file.
pub fn create_unique_file(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir).map_err(Error::Io)?;
    for attempt in 1..=MAX_COLLISION_ATTEMPTS {
        let path = dir.join(candidate_name(name, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Err(Error::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for '{}' in '{}'", name, dir.display()),
    )))
}

/// Creates a new folder in `dir`, renaming on collision.
pub fn create_unique_dir(dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(Error::Io)?;
    for attempt in 1..=MAX_COLLISION_ATTEMPTS {
        let path = dir.join(candidate_name(name, attempt));
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Err(Error::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free folder name for '{}' in '{}'", name, dir.display()),
    )))
}

/// Creates (or truncates) a file at `path`, creating parent folders.
pub fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    File::create(path).map_err(Error::Io)
}

/// Returns the base name of a path as UTF-8.
pub fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidArgument(format!("'{}' has no file name", path.display())))
}

/// Sums the sizes of the given files. Unreadable entries count as zero.
pub fn total_size<P: AsRef<Path>>(files: &[P]) -> u64 {
    files
        .iter()
        .filter_map(|f| fs::metadata(f.as_ref()).ok())
        .map(|m| m.len())
        .sum()
}

/// Returns a file's modification time, if available.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Applies a Unix modification time to an extracted file.
///
/// Failures are logged and otherwise ignored.
pub(crate) fn apply_mtime(path: &Path, unix_secs: u64) {
    if unix_secs == 0 {
        return;
    }
    let mtime = filetime::FileTime::from_unix_time(unix_secs as i64, 0);
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        log::warn!(
            "Failed to set modification time on '{}': {}",
            path.display(),
            e
        );
    }
}

/// Seconds since the Unix epoch for a timestamp (zero before the epoch).
pub(crate) fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Removes a partially written output, logging on failure.
pub(crate) fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!(
                "Failed to clean up partial file '{}': {}",
                path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.txt"), ("a", ".txt"));
        assert_eq!(split_name("a.tar.bz2"), ("a", ".tar.bz2"));
        assert_eq!(split_name("noext"), ("noext", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_create_unique_file_renames() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = create_unique_file(dir.path(), "a.txt").unwrap();
        let (second, _) = create_unique_file(dir.path(), "a.txt").unwrap();
        let (third, _) = create_unique_file(dir.path(), "a.txt").unwrap();
        assert_eq!(first.file_name().unwrap(), "a.txt");
        assert_eq!(second.file_name().unwrap(), "a (2).txt");
        assert_eq!(third.file_name().unwrap(), "a (3).txt");
    }

    #[test]
    fn test_create_unique_dir_renames() {
        let dir = tempfile::tempdir().unwrap();
        let first = create_unique_dir(dir.path(), "docs").unwrap();
        let second = create_unique_dir(dir.path(), "docs").unwrap();
        assert!(first.is_dir());
        assert_eq!(second.file_name().unwrap(), "docs (2)");
    }

    #[test]
    fn test_total_size_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        fs::write(&a, b"12345").unwrap();
        let missing = dir.path().join("missing");
        assert_eq!(total_size(&[a, missing]), 5);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/tmp/x/report.pdf")).unwrap(), "report.pdf");
        assert!(base_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_apply_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        apply_mtime(&path, 1_000_000_000);
        assert_eq!(unix_secs(modified_time(&path).unwrap()), 1_000_000_000);
    }
}
