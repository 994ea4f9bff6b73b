//! Archive type registry.
//!
//! Maps file extensions to the closed [`ArchiveType`] set. Multi-segment
//! extensions (`.tar.gz`) live in an extended table that is always consulted
//! before the single-segment table, so `"a.tar.gz"` resolves to
//! [`ArchiveType::TarGz`] rather than [`ArchiveType::GZip`].
//!
//! Unrecognized input never fails; it yields [`ArchiveType::Unknown`] and the
//! caller decides how to surface an unsupported format.
//!
//! # Example
//!
//! ```rust
//! use arcflow::ArchiveType;
//! use arcflow::archive_type::determine_type;
//!
//! assert_eq!(determine_type(".tar.gz"), ArchiveType::TarGz);
//! assert_eq!(determine_type("ZIP"), ArchiveType::Zip);
//! assert_eq!(ArchiveType::from_path("photos/summer.tbz2"), ArchiveType::TarBz2);
//! assert_eq!(determine_type(".docx"), ArchiveType::Unknown);
//! ```

use std::fmt;
use std::path::Path;

/// The archive formats understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchiveType {
    /// PKZIP container.
    Zip,
    /// Single gzip-compressed file.
    GZip,
    /// Single bzip2-compressed file.
    BZip2,
    /// 7-Zip container (decompression only).
    SevenZip,
    /// Uncompressed TAR container.
    Tar,
    /// TAR compressed with gzip.
    TarGz,
    /// TAR compressed with bzip2.
    TarBz2,
    /// TAR compressed with LZMA.
    TarLz,
    /// Not a recognized archive.
    #[default]
    Unknown,
}

/// Multi-segment extensions, checked first.
const EXTENDED_EXTENSIONS: &[(&str, ArchiveType)] = &[
    (".tar.gz", ArchiveType::TarGz),
    (".tar.bz2", ArchiveType::TarBz2),
    (".tar.lz", ArchiveType::TarLz),
];

/// Single-segment extensions.
const EXTENSIONS: &[(&str, ArchiveType)] = &[
    (".zip", ArchiveType::Zip),
    (".tar", ArchiveType::Tar),
    (".gzip", ArchiveType::GZip),
    (".gz", ArchiveType::GZip),
    (".bz2", ArchiveType::BZip2),
    (".tgz", ArchiveType::TarGz),
    (".tgzip", ArchiveType::TarGz),
    (".tbz2", ArchiveType::TarBz2),
    (".tbzip2", ArchiveType::TarBz2),
    (".tlz", ArchiveType::TarLz),
    (".tlzip", ArchiveType::TarLz),
    (".tlzma", ArchiveType::TarLz),
    (".7z", ArchiveType::SevenZip),
];

/// Normalizes an extension to lower case with a single leading dot.
fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    if !trimmed.starts_with('.') {
        normalized.push('.');
    }
    normalized.push_str(&trimmed.to_ascii_lowercase());
    normalized
}

/// Determines the archive type for an extension such as `".tar.gz"` or `"zip"`.
///
/// The extended table is searched first, then the single-segment table; the
/// first hit wins.
pub fn determine_type(extension: &str) -> ArchiveType {
    let normalized = normalize_extension(extension);
    EXTENDED_EXTENSIONS
        .iter()
        .chain(EXTENSIONS.iter())
        .find(|(ext, _)| *ext == normalized)
        .map(|(_, archive_type)| *archive_type)
        .unwrap_or(ArchiveType::Unknown)
}

impl ArchiveType {
    /// Determines the archive type from a file name or path.
    ///
    /// The last two extension segments are tried before the last one, so
    /// `backup.tar.bz2` is [`ArchiveType::TarBz2`].
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let Some(name) = path.as_ref().file_name().and_then(|n| n.to_str()) else {
            return Self::Unknown;
        };
        let name = name.to_ascii_lowercase();

        for (ext, archive_type) in EXTENDED_EXTENSIONS {
            if name.len() > ext.len() && name.ends_with(ext) {
                return *archive_type;
            }
        }

        match name.rfind('.') {
            Some(idx) if idx > 0 => determine_type(&name[idx..]),
            _ => Self::Unknown,
        }
    }

    /// Canonical extension used when naming a new archive of this type.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::GZip => ".gz",
            Self::BZip2 => ".bz2",
            Self::SevenZip => ".7z",
            Self::Tar => ".tar",
            Self::TarGz => ".tar.gz",
            Self::TarBz2 => ".tar.bz2",
            Self::TarLz => ".tar.lz",
            Self::Unknown => "",
        }
    }

    /// Returns true for formats that hold exactly one payload file.
    pub fn is_single_file(self) -> bool {
        matches!(self, Self::GZip | Self::BZip2)
    }

    /// Returns true if archives of this type can be created.
    pub fn supports_compression(self) -> bool {
        !matches!(self, Self::SevenZip | Self::Unknown)
    }

    /// Returns true for the TAR family.
    pub fn is_tar(self) -> bool {
        matches!(self, Self::Tar | Self::TarGz | Self::TarBz2 | Self::TarLz)
    }

    /// Returns true if the type is a recognized archive.
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Human-readable format name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Zip => "ZIP",
            Self::GZip => "GZIP",
            Self::BZip2 => "BZIP2",
            Self::SevenZip => "7-Zip",
            Self::Tar => "TAR",
            Self::TarGz => "TAR+GZIP",
            Self::TarBz2 => "TAR+BZIP2",
            Self::TarLz => "TAR+LZMA",
            Self::Unknown => "unknown",
        }
    }

    /// Strips this type's extension from a file name, if present.
    ///
    /// Used to derive the payload name of single-file archives and the folder
    /// name for extraction.
    pub fn strip_extension(name: &str) -> &str {
        let lower = name.to_ascii_lowercase();
        for (ext, _) in EXTENDED_EXTENSIONS.iter().chain(EXTENSIONS.iter()) {
            if lower.len() > ext.len() && lower.ends_with(ext) {
                return &name[..name.len() - ext.len()];
            }
        }
        name
    }

    /// All known archive types.
    pub fn all() -> &'static [ArchiveType] {
        &[
            Self::Zip,
            Self::GZip,
            Self::BZip2,
            Self::SevenZip,
            Self::Tar,
            Self::TarGz,
            Self::TarBz2,
            Self::TarLz,
        ]
    }

    /// Extensions registered for this type, extended ones first.
    pub fn registered_extensions(self) -> Vec<&'static str> {
        EXTENDED_EXTENSIONS
            .iter()
            .chain(EXTENSIONS.iter())
            .filter(|(_, t)| *t == self)
            .map(|(ext, _)| *ext)
            .collect()
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
