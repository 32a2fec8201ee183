//! The local advisory database.
//!
//! Advisories come as headerless two-column CSV:
//!
//! ```text
//! # file table: hash,reason
//! 5e0e0b8a...c1,known backdoored xz binary
//!
//! # package table: pattern,reason
//! openssl-1.1.1-r0:alpine,CVE-2023-0286
//! curl,every curl build is affected
//! ```
//!
//! Lines starting with `#` are comments. Package patterns use the
//! `name-version-release:repository` syntax of [`Package::parse_pattern`];
//! any part left empty matches anything.
//!
//! Scanners only see the database through the [`FileChecker`] and
//! [`PackageChecker`] traits.

use crate::error::{Error, Result};
use crate::model::{FileVulnerability, Package, PackageVulnerability, LOCAL_SOURCE};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Decides whether a file, identified by its content hash, is vulnerable.
pub trait FileChecker: Send + Sync {
    fn check_file(&self, path: &str, digest: &str) -> Option<FileVulnerability>;
}

/// Decides whether an installed package is vulnerable.
pub trait PackageChecker: Send + Sync {
    fn check_package(&self, package: &Package) -> Option<PackageVulnerability>;
}

/// An advisory pattern for one package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageAdvisory {
    pub pattern: Package,
    pub reason: String,
}

impl PackageAdvisory {
    /// Every non-empty field of the pattern must equal the package's field.
    pub fn matches(&self, package: &Package) -> bool {
        fn field(pattern: &str, value: &str) -> bool {
            pattern.is_empty() || pattern == value
        }

        self.pattern.name == package.name
            && field(&self.pattern.version, &package.version)
            && field(&self.pattern.release, &package.release)
            && field(&self.pattern.repository, &package.repository)
    }
}

/// File-hash and package advisories loaded from local CSV files.
///
/// Loading appends: several sources can be read into one database. The
/// database is read-only once scanning starts and can be shared across
/// threads.
#[derive(Debug, Default)]
pub struct AdvisoryDatabase {
    files: HashMap<String, String>,
    packages: HashMap<String, Vec<PackageAdvisory>>,
}

impl AdvisoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `hash,reason` records. A hash listed twice keeps the last reason.
    pub fn load_file_advisories<R: Read>(&mut self, input: R) -> Result<()> {
        let mut loaded = 0usize;
        for_each_record(input, |hash, reason| {
            self.files.insert(hash.to_string(), reason.to_string());
            loaded += 1;
        })?;
        debug!(loaded, total = self.files.len(), "loaded file advisories");
        Ok(())
    }

    /// Reads `pattern,reason` records. Patterns for the same name are
    /// checked in the order they were loaded.
    pub fn load_package_advisories<R: Read>(&mut self, input: R) -> Result<()> {
        let mut loaded = 0usize;
        for_each_record(input, |pattern, reason| {
            let pattern = Package::parse_pattern(pattern);
            self.packages
                .entry(pattern.name.clone())
                .or_default()
                .push(PackageAdvisory {
                    pattern,
                    reason: reason.to_string(),
                });
            loaded += 1;
        })?;
        debug!(loaded, names = self.packages.len(), "loaded package advisories");
        Ok(())
    }

    pub fn load_file_advisories_path(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        self.load_file_advisories(file)
    }

    pub fn load_package_advisories_path(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        self.load_package_advisories(file)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn package_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.packages.is_empty()
    }

    /// Advisories registered under `name`, in load order.
    pub fn advisories_for(&self, name: &str) -> &[PackageAdvisory] {
        self.packages.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

impl FileChecker for AdvisoryDatabase {
    fn check_file(&self, path: &str, digest: &str) -> Option<FileVulnerability> {
        let reason = self.files.get(digest)?;
        Some(FileVulnerability {
            name: path.to_string(),
            hash: digest.to_string(),
            source: LOCAL_SOURCE.to_string(),
            reason: reason.clone(),
        })
    }
}

impl PackageChecker for AdvisoryDatabase {
    fn check_package(&self, package: &Package) -> Option<PackageVulnerability> {
        let advisory = self
            .advisories_for(&package.name)
            .iter()
            .find(|advisory| advisory.matches(package))?;

        Some(PackageVulnerability {
            package: package.clone(),
            source: LOCAL_SOURCE.to_string(),
            reason: advisory.reason.clone(),
        })
    }
}

/// Feeds every two-column record to `handle`; any other column count is an
/// error naming the line.
fn for_each_record<R, F>(input: R, mut handle: F) -> Result<()>
where
    R: Read,
    F: FnMut(&str, &str),
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(input);

    let mut record = csv::StringRecord::new();
    let mut count = 0u64;
    loop {
        count += 1;
        let more = reader.read_record(&mut record).map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(count);
            Error::AdvisoryFormat {
                line,
                reason: csv_reason(&e),
            }
        })?;
        if !more {
            break;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(count);
        if record.len() != 2 {
            return Err(Error::AdvisoryFormat {
                line,
                reason: format!("wrong record count: expected 2 fields, found {}", record.len()),
            });
        }
        handle(&record[0], &record[1]);
    }
    Ok(())
}

fn csv_reason(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Io(e) => e.to_string(),
        csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {}", err),
        _ => err.to_string(),
    }
}
