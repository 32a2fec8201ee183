//! Read-only filesystem views that scans run against.
//!
//! A scan never touches `std::fs` directly. It gets a [`Filesystem`] that
//! someone else built: a live directory tree ([`DirFs`]) or an unpacked
//! archive or container export ([`ArchiveFs`]).
//!
//! Paths are slash-separated and relative to the filesystem root. A leading
//! `/` or `./` is ignored, and `.` (or the empty string) names the root
//! itself, so `/var/lib/dpkg/status` and `var/lib/dpkg/status` open the same
//! file.

mod archive;
mod dir;

pub use archive::ArchiveFs;
pub use dir::DirFs;

use crate::error::Result;
use std::io::Read;

/// One entry produced by [`Filesystem::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub is_dir: bool,
    /// Regular file. Symlinks, devices, FIFOs and sockets are neither this
    /// nor `is_dir`.
    pub is_file: bool,
}

/// A tree of files that can be opened and walked.
pub trait Filesystem: Send + Sync {
    /// Opens a file for reading.
    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>>;

    /// Returns true if a file or directory exists at `path`.
    ///
    /// Failures are reported as absence.
    fn exists(&self, path: &str) -> bool;

    /// Walks `root` and everything below it, depth-first, with the entries
    /// of each directory in lexical order. `root` itself comes first.
    fn walk<'a>(&'a self, root: &str) -> Box<dyn Iterator<Item = Result<WalkEntry>> + 'a>;
}

/// Normalizes a path to the relative, slash-separated form used by every
/// [`Filesystem`].
pub fn clean_path(path: &str) -> String {
    let parts = path_components(path);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Splits a path into its components; the root has none.
pub(crate) fn path_components(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(str::to_string)
        .collect()
}

/// Joins two paths inside a filesystem.
pub fn join_path(base: &str, path: &str) -> String {
    clean_path(&format!("{}/{}", base, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path_strips_leading_slash() {
        assert_eq!(clean_path("/var/lib/dpkg/status"), "var/lib/dpkg/status");
        assert_eq!(clean_path("./etc/apk/"), "etc/apk");
    }

    #[test]
    fn test_clean_path_root() {
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("."), ".");
        assert_eq!(clean_path("/"), ".");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(".", "package-lock.json"), "package-lock.json");
        assert_eq!(
            join_path("/srv/app/", "package-lock.json"),
            "srv/app/package-lock.json"
        );
    }
}
