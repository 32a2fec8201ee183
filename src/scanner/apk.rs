use super::{read_paragraph, scan_list, PackageReader, ScanOutcome};
use crate::database::PackageChecker;
use crate::error::Result;
use crate::fs::Filesystem;
use crate::model::{cut, Package, PackageVulnerability};
use std::io::{BufRead, BufReader, Lines, Read};

/// The APK installed-package database.
pub const APK_INSTALLED: &str = "lib/apk/db/installed";

/// Reads the APK installed database: `X:value` lines, one blank-line
/// separated block per package. `P:` is the name and `V:` the version.
///
/// Alpine releases look like `-r4`; the first character of the release is
/// the `r` marker and is dropped, so the release reads `4`, the same as dpkg
/// revisions.
pub struct ApkListReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> ApkListReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
        }
    }
}

impl<R: Read> ApkListReader<BufReader<R>> {
    pub fn from_reader(input: R) -> Self {
        Self::new(BufReader::new(input))
    }
}

impl<R: BufRead> PackageReader for ApkListReader<R> {
    fn next_package(&mut self) -> Result<Option<Package>> {
        loop {
            let mut package = Package::default();

            let more = read_paragraph(&mut self.lines, |line| {
                if let Some(name) = line.strip_prefix("P:") {
                    package.name = name.to_string();
                } else if let Some(value) = line.strip_prefix("V:") {
                    let (version, release) = cut(value, '-');
                    package.version = version.to_string();
                    let mut marker = release.chars();
                    marker.next();
                    package.release = marker.as_str().to_string();
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

/// Scans the packages recorded in the APK installed database.
pub fn scan_apk(
    filesystem: &dyn Filesystem,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    scan_list(filesystem, APK_INSTALLED, checker, |input| {
        Ok(ApkListReader::from_reader(input))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::AptListReader;

    const INSTALLED: &str = "\
C:Q1abc=
P:musl
V:1.2.4-r2
A:x86_64
o:musl

C:Q1def=
P:busybox
V:1.36.1-r5
T:Size optimized toolbox

P:ca-certificates-bundle
V:20230506
";

    fn read_all<P: PackageReader>(mut reader: P) -> Vec<Package> {
        let mut packages = Vec::new();
        while let Some(pkg) = reader.next_package().unwrap() {
            packages.push(pkg);
        }
        packages
    }

    #[test]
    fn test_reads_packages() {
        let packages = read_all(ApkListReader::from_reader(INSTALLED.as_bytes()));
        assert_eq!(packages.len(), 3);

        assert_eq!(packages[0], Package::new("musl", "1.2.4").with_release("2"));
        assert_eq!(packages[1], Package::new("busybox", "1.36.1").with_release("5"));
        assert_eq!(packages[2], Package::new("ca-certificates-bundle", "20230506"));
    }

    #[test]
    fn test_release_marker_dropped() {
        let packages = read_all(ApkListReader::from_reader(
            "P:a\nV:1.0-r12\n\nP:b\nV:2.0-\n\nP:c\nV:3.0-x7\n".as_bytes(),
        ));
        assert_eq!(packages[0].release, "12");
        assert_eq!(packages[1].release, "");
        assert_eq!(packages[2].release, "7");
    }

    #[test]
    fn test_empty_stream() {
        assert!(read_all(ApkListReader::from_reader("".as_bytes())).is_empty());
    }

    #[test]
    fn test_matches_dpkg_rendering() {
        let apk = "P:zlib\nV:1.3.1-r0\n\nP:xz-libs\nV:5.4.5-r1\n";
        let dpkg = "Package: zlib\nVersion: 1.3.1-0\n\nPackage: xz-libs\nVersion: 5.4.5-1\n";

        let triples = |packages: Vec<Package>| -> Vec<(String, String, String)> {
            packages
                .into_iter()
                .map(|p| (p.name, p.version, p.release))
                .collect()
        };

        assert_eq!(
            triples(read_all(ApkListReader::from_reader(apk.as_bytes()))),
            triples(read_all(AptListReader::from_reader(dpkg.as_bytes())))
        );
    }
}
