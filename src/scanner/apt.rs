use super::{read_paragraph, scan_list, PackageReader, ScanOutcome};
use crate::database::PackageChecker;
use crate::error::Result;
use crate::fs::Filesystem;
use crate::model::{cut, Package, PackageVulnerability};
use std::io::{BufRead, BufReader, Lines, Read};

/// The dpkg status file.
pub const DPKG_STATUS: &str = "var/lib/dpkg/status";

/// Reads the dpkg status file: one `Key: Value` paragraph per package.
///
/// Only `Package` and `Version` are looked at, so every paragraph with a
/// name is yielded whatever its `Status` says.
pub struct AptListReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> AptListReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
        }
    }
}

impl<R: Read> AptListReader<BufReader<R>> {
    pub fn from_reader(input: R) -> Self {
        Self::new(BufReader::new(input))
    }
}

impl<R: BufRead> PackageReader for AptListReader<R> {
    fn next_package(&mut self) -> Result<Option<Package>> {
        loop {
            let mut package = Package::default();

            let more = read_paragraph(&mut self.lines, |line| {
                // Continuation lines of multi-line fields
                if line.starts_with([' ', '\t']) {
                    return;
                }
                let Some((key, value)) = line.split_once(':') else {
                    return;
                };
                let value = value.trim();
                match key {
                    "Package" => package.name = value.to_string(),
                    "Version" => {
                        let (version, release) = cut(value, '-');
                        package.version = version.to_string();
                        package.release = release.to_string();
                    }
                    _ => {}
                }
            })?;

            if !more {
                return Ok(None);
            }
            if !package.name.is_empty() {
                return Ok(Some(package));
            }
        }
    }
}

/// Scans the packages recorded in the dpkg status file.
pub fn scan_apt(
    filesystem: &dyn Filesystem,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    scan_list(filesystem, DPKG_STATUS, checker, |input| {
        Ok(AptListReader::from_reader(input))
    })
}
