use super::ScanOutcome;
use crate::database::FileChecker;
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::model::FileVulnerability;
use sha2::{Digest, Sha256};
use std::io;
use tracing::{debug, info};

/// Returns the lowercase hex SHA-256 of a file's contents.
pub fn hash_file(filesystem: &dyn Filesystem, path: &str) -> Result<String> {
    let mut input = filesystem.open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut input, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes every file below `root` and checks each digest.
///
/// Entries are visited depth-first in lexical order. Only regular files are
/// hashed; directories, symlinks and special files are passed over. The
/// first walk or read error stops the scan, keeping the matches found so far.
pub fn scan_files(
    filesystem: &dyn Filesystem,
    root: &str,
    checker: &dyn FileChecker,
) -> ScanOutcome<FileVulnerability> {
    let mut outcome = ScanOutcome::empty();
    let mut hashed = 0usize;

    for entry in filesystem.walk(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                outcome.error = Some(error);
                break;
            }
        };
        if entry.is_dir {
            continue;
        }
        if !entry.is_file {
            debug!(path = %entry.path, "not a regular file, skipping");
            continue;
        }

        let digest = match hash_file(filesystem, &entry.path) {
            Ok(digest) => digest,
            Err(error) => {
                outcome.error = Some(error);
                break;
            }
        };
        hashed += 1;
        debug!(path = %entry.path, sha256 = %digest, "hashed file");

        if let Some(vuln) = checker.check_file(&entry.path, &digest) {
            outcome.findings.push(vuln);
        }
    }

    info!(
        root,
        files = hashed,
        matches = outcome.findings.len(),
        "file scan finished"
    );
    outcome
}
