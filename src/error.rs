//! Error type shared by the library.
//!
//! Scanners never discard what they already found when one of these is
//! raised; see [`ScanOutcome`](crate::scanner::ScanOutcome).

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file or directory could not be opened, read or walked.
    #[error("io error: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stream handed to a reader failed mid-read.
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    /// An advisory CSV record was malformed.
    #[error("advisory database line {line}: {reason}")]
    AdvisoryFormat { line: u64, reason: String },

    /// A package-lock.json document could not be decoded.
    #[error("manifest parse error: {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("package database error: {0}")]
    PackageDatabase(#[from] rusqlite::Error),

    #[error("unsupported archive: {0}")]
    UnsupportedArchive(String),

    #[error("container export failed: {container}: {reason}")]
    ContainerExport { container: String, reason: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
