//! Package and file scanners.
//!
//! Every package database format gets a reader implementing
//! [`PackageReader`]; the orchestration functions here drive those readers
//! (or the file hash scanner) against a checker and collect the matches.
//!
//! | Reader | Package manager | Location |
//! |--------|-----------------|----------|
//! | [`AptListReader`] | APT / dpkg | `var/lib/dpkg/status` |
//! | [`ApkListReader`] | APK | `lib/apk/db/installed` |
//! | [`DnfListReader`] | DNF | `var/cache/dnf/packages.db` |
//! | [`NpmListReader`] | NPM project | `<project>/package-lock.json` |
//!
//! Pacman, XBPS, Flatpak and Snap are detected but have no reader yet; they
//! contribute no packages.
//!
//! # Example
//!
//! ```no_run
//! use microscope::database::AdvisoryDatabase;
//! use microscope::fs::DirFs;
//! use microscope::scanner::scan_packages;
//!
//! let mut db = AdvisoryDatabase::new();
//! db.load_package_advisories("openssl-1.1.1,CVE-2023-0286\n".as_bytes())?;
//!
//! let outcome = scan_packages(&DirFs::new("/"), &db);
//! for vuln in &outcome.findings {
//!     println!("{}", vuln);
//! }
//! # Ok::<(), microscope::Error>(())
//! ```

mod apk;
mod apt;
mod dnf;
mod files;
mod npm;

pub use apk::{scan_apk, ApkListReader, APK_INSTALLED};
pub use apt::{scan_apt, AptListReader, DPKG_STATUS};
pub use dnf::{scan_dnf, DnfListReader, DNF_PACKAGE_DB, DNF_QUERY};
pub use files::{hash_file, scan_files};
pub use npm::{scan_npm, scan_npm_project, NpmListReader, PACKAGE_LOCK};

use crate::database::PackageChecker;
use crate::detect::{detect, PackageManager};
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::model::{Package, PackageVulnerability};
use std::io::{BufRead, Lines};
use tracing::{debug, info, warn};

/// Sequential access to a list of installed packages.
///
/// A reader is consumed once, front to back. `Ok(None)` means the list is
/// exhausted; that is not an error.
pub trait PackageReader {
    fn next_package(&mut self) -> Result<Option<Package>>;
}

/// What a scan found, plus the error that stopped it early, if any.
///
/// Findings collected before the error are kept.
#[derive(Debug)]
pub struct ScanOutcome<T> {
    pub findings: Vec<T>,
    pub error: Option<Error>,
}

impl<T> ScanOutcome<T> {
    pub fn empty() -> Self {
        Self {
            findings: Vec::new(),
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            findings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Appends another outcome's findings. Returns false, and keeps the
    /// error, if that outcome failed.
    pub fn absorb(&mut self, other: ScanOutcome<T>) -> bool {
        self.findings.extend(other.findings);
        match other.error {
            Some(error) => {
                self.error = Some(error);
                false
            }
            None => true,
        }
    }

    pub fn into_parts(self) -> (Vec<T>, Option<Error>) {
        (self.findings, self.error)
    }
}

/// Drains `reader`, checking every package.
pub fn scan_package_reader(
    reader: &mut dyn PackageReader,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    let mut outcome = ScanOutcome::empty();
    let mut seen = 0usize;

    loop {
        match reader.next_package() {
            Ok(Some(package)) => {
                seen += 1;
                if let Some(vuln) = checker.check_package(&package) {
                    outcome.findings.push(vuln);
                }
            }
            Ok(None) => break,
            Err(error) => {
                outcome.error = Some(error);
                break;
            }
        }
    }

    debug!(
        packages = seen,
        matches = outcome.findings.len(),
        "package list scanned"
    );
    outcome
}

/// Scans the packages installed by one package manager.
pub fn scan_package_manager(
    filesystem: &dyn Filesystem,
    checker: &dyn PackageChecker,
    manager: PackageManager,
) -> ScanOutcome<PackageVulnerability> {
    info!(manager = %manager, "scanning packages");
    match manager {
        PackageManager::Apt => scan_apt(filesystem, checker),
        PackageManager::Apk => scan_apk(filesystem, checker),
        PackageManager::Dnf => scan_dnf(filesystem, checker),
        PackageManager::Pacman
        | PackageManager::Xbps
        | PackageManager::Flatpak
        | PackageManager::Snap => {
            debug!(manager = %manager, "no package reader, skipping");
            ScanOutcome::empty()
        }
    }
}

/// Detects the package managers on `filesystem` and scans each of them.
///
/// The first manager that fails stops the scan; matches found before it are
/// kept.
pub fn scan_packages(
    filesystem: &dyn Filesystem,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    let managers = detect(filesystem);
    if managers.is_empty() {
        warn!("no package managers detected");
    }

    let mut outcome = ScanOutcome::empty();
    for manager in managers {
        if !outcome.absorb(scan_package_manager(filesystem, checker, manager)) {
            break;
        }
    }
    outcome
}

/// Opens a package list inside `filesystem` and scans it with the reader
/// built by `make_reader`.
pub(crate) fn scan_list<'a, F, P>(
    filesystem: &'a dyn Filesystem,
    path: &str,
    checker: &dyn PackageChecker,
    make_reader: F,
) -> ScanOutcome<PackageVulnerability>
where
    F: FnOnce(Box<dyn std::io::Read + 'a>) -> Result<P>,
    P: PackageReader,
{
    let mut reader = match filesystem.open(path).and_then(make_reader) {
        Ok(reader) => reader,
        Err(error) => return ScanOutcome::failed(error),
    };
    scan_package_reader(&mut reader, checker)
}

/// Reads one blank-line separated record, handing each of its lines to
/// `feed`. Returns false once the input is exhausted.
pub(crate) fn read_paragraph<R, F>(lines: &mut Lines<R>, mut feed: F) -> Result<bool>
where
    R: BufRead,
    F: FnMut(&str),
{
    let mut fed = false;
    for line in lines {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if fed {
                return Ok(true);
            }
            continue;
        }
        feed(line);
        fed = true;
    }
    Ok(fed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::AdvisoryDatabase;
    use std::collections::VecDeque;

    struct ListReader {
        items: VecDeque<Result<Package>>,
    }

    impl ListReader {
        fn new(items: Vec<Result<Package>>) -> Self {
            Self {
                items: items.into(),
            }
        }
    }

    impl PackageReader for ListReader {
        fn next_package(&mut self) -> Result<Option<Package>> {
            self.items.pop_front().transpose()
        }
    }

    fn db(packages: &str) -> AdvisoryDatabase {
        let mut db = AdvisoryDatabase::new();
        db.load_package_advisories(packages.as_bytes()).unwrap();
        db
    }

    #[test]
    fn test_scan_reader_keeps_enumeration_order() {
        let db = db("curl,bad curl\nzlib,bad zlib\n");
        let mut reader = ListReader::new(vec![
            Ok(Package::new("zlib", "1.3")),
            Ok(Package::new("bash", "5.2")),
            Ok(Package::new("curl", "8.0")),
        ]);

        let outcome = scan_package_reader(&mut reader, &db);
        assert!(outcome.is_ok());
        let names: Vec<&str> = outcome
            .findings
            .iter()
            .map(|v| v.package.name.as_str())
            .collect();
        assert_eq!(names, vec!["zlib", "curl"]);
    }

    #[test]
    fn test_scan_reader_error_keeps_partial_results() {
        let db = db("curl,bad curl\n");
        let mut reader = ListReader::new(vec![
            Ok(Package::new("curl", "8.0")),
            Err(Error::UnsupportedArchive("broken".to_string())),
            Ok(Package::new("curl", "8.1")),
        ]);

        let outcome = scan_package_reader(&mut reader, &db);
        assert_eq!(outcome.findings.len(), 1);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_unsupported_manager_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fs = crate::fs::DirFs::new(dir.path());
        let db = db("curl,bad curl\n");

        for manager in [
            PackageManager::Pacman,
            PackageManager::Xbps,
            PackageManager::Flatpak,
            PackageManager::Snap,
        ] {
            let outcome = scan_package_manager(&fs, &db, manager);
            assert!(outcome.is_ok());
            assert!(outcome.findings.is_empty());
        }
    }

    #[test]
    fn test_absorb() {
        let mut total: ScanOutcome<u32> = ScanOutcome::empty();
        assert!(total.absorb(ScanOutcome {
            findings: vec![1, 2],
            error: None,
        }));
        assert!(!total.absorb(ScanOutcome {
            findings: vec![3],
            error: Some(Error::UnsupportedArchive("x".to_string())),
        }));
        assert_eq!(total.findings, vec![1, 2, 3]);
        assert!(!total.is_ok());
    }

    #[test]
    fn test_read_paragraph_skips_extra_blank_lines() {
        let input = "\n\nA: 1\nB: 2\n\n\n\nC: 3";
        let mut lines = input.as_bytes().lines();

        let mut first = Vec::new();
        assert!(read_paragraph(&mut lines, |l| first.push(l.to_string())).unwrap());
        assert_eq!(first, vec!["A: 1", "B: 2"]);

        let mut second = Vec::new();
        assert!(read_paragraph(&mut lines, |l| second.push(l.to_string())).unwrap());
        assert_eq!(second, vec!["C: 3"]);

        assert!(!read_paragraph(&mut lines, |_| {}).unwrap());
    }
}
