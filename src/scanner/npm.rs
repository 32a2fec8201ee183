use super::{scan_list, PackageReader, ScanOutcome};
use crate::database::PackageChecker;
use crate::error::{Error, Result};
use crate::fs::{join_path, Filesystem};
use crate::model::{Package, PackageVulnerability};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

/// The lockfile read for an NPM project.
pub const PACKAGE_LOCK: &str = "package-lock.json";

#[derive(Deserialize)]
struct PackageLock {
    /// lockfile v2/v3: install path -> entry
    #[serde(default)]
    packages: Option<BTreeMap<String, LockEntry>>,
    /// lockfile v1: package name -> entry
    #[serde(default)]
    dependencies: Option<BTreeMap<String, LockEntry>>,
}

#[derive(Deserialize)]
struct LockEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Reads the packages listed in a `package-lock.json`.
///
/// The document is decoded up front. Entries come out sorted by their key
/// in the lockfile. An entry without a `name` is named after the last
/// segment of its install path (`node_modules/@babel/core` gives `core`).
pub struct NpmListReader {
    list: std::vec::IntoIter<Package>,
}

impl NpmListReader {
    pub fn new<R: Read>(package_lock: R) -> Result<Self> {
        Self::with_path(package_lock, PACKAGE_LOCK)
    }

    /// Like [`new`](Self::new), naming `path` in decode errors.
    pub fn with_path<R: Read>(mut package_lock: R, path: &str) -> Result<Self> {
        let mut content = String::new();
        package_lock
            .read_to_string(&mut content)
            .map_err(|e| Error::io(path, e))?;

        if content.trim().is_empty() {
            return Ok(Self::from_packages(Vec::new()));
        }

        let lock: PackageLock = serde_json::from_str(&content).map_err(|e| Error::Manifest {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let packages = match (lock.packages, lock.dependencies) {
            (Some(packages), _) => packages
                .into_iter()
                .map(|(install_path, entry)| {
                    let fallback = install_path.rsplit('/').next().unwrap_or_default();
                    to_package(entry, fallback)
                })
                .collect(),
            (None, Some(dependencies)) => dependencies
                .into_iter()
                .map(|(name, entry)| to_package(entry, &name))
                .collect(),
            (None, None) => Vec::new(),
        };

        Ok(Self::from_packages(packages))
    }

    fn from_packages(packages: Vec<Package>) -> Self {
        let list: Vec<Package> = packages
            .into_iter()
            .filter(|pkg| !pkg.name.is_empty())
            .collect();
        Self {
            list: list.into_iter(),
        }
    }
}

fn to_package(entry: LockEntry, fallback_name: &str) -> Package {
    let name = entry
        .name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback_name.to_string());
    Package::new(name, entry.version.unwrap_or_default())
}

impl PackageReader for NpmListReader {
    fn next_package(&mut self) -> Result<Option<Package>> {
        Ok(self.list.next())
    }
}

/// Scans a `package-lock.json` stream.
pub fn scan_npm<R: Read>(
    package_lock: R,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    match NpmListReader::new(package_lock) {
        Ok(mut reader) => super::scan_package_reader(&mut reader, checker),
        Err(error) => ScanOutcome::failed(error),
    }
}

/// Scans the `package-lock.json` of the project at `project` inside
/// `filesystem`.
pub fn scan_npm_project(
    filesystem: &dyn Filesystem,
    project: &str,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    let path = join_path(project, PACKAGE_LOCK);
    scan_list(filesystem, &path, checker, |input| {
        NpmListReader::with_path(input, &path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::AdvisoryDatabase;

    const LOCK_V3: &str = r#"{
  "name": "web",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "web", "version": "1.0.0" },
    "node_modules/lodash": { "version": "4.17.20" },
    "node_modules/@babel/core": { "version": "7.23.0" },
    "node_modules/express": { "version": "4.18.2", "dependencies": { "qs": "6.11.0" } },
    "node_modules/express/node_modules/qs": { "version": "6.11.0" },
    "node_modules/alias": { "name": "real-name", "version": "2.0.0" }
  }
}"#;

    fn read_all(reader: &mut NpmListReader) -> Vec<Package> {
        let mut packages = Vec::new();
        while let Some(pkg) = reader.next_package().unwrap() {
            packages.push(pkg);
        }
        packages
    }

    #[test]
    fn test_reads_sorted_by_key() {
        let mut reader = NpmListReader::new(LOCK_V3.as_bytes()).unwrap();
        let packages = read_all(&mut reader);

        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["web", "core", "real-name", "express", "qs", "lodash"]
        );
        assert_eq!(packages[1].version, "7.23.0");
        assert_eq!(packages[5].version, "4.17.20");
    }

    #[test]
    fn test_lockfile_v1_dependencies() {
        let lock = r#"{
  "lockfileVersion": 1,
  "dependencies": {
    "minimist": { "version": "1.2.5", "requires": {} },
    "@types/node": { "version": "20.1.0" }
  }
}"#;
        let mut reader = NpmListReader::new(lock.as_bytes()).unwrap();
        let packages = read_all(&mut reader);

        assert_eq!(packages[0], Package::new("@types/node", "20.1.0"));
        assert_eq!(packages[1], Package::new("minimist", "1.2.5"));
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = NpmListReader::new("".as_bytes()).unwrap();
        assert!(read_all(&mut reader).is_empty());
    }

    #[test]
    fn test_malformed_json() {
        let err = NpmListReader::new("{ not json".as_bytes()).err().unwrap();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[test]
    fn test_scan_npm() {
        let mut db = AdvisoryDatabase::new();
        db.load_package_advisories("lodash-4.17.20,CVE-2021-23337\n".as_bytes())
            .unwrap();

        let outcome = scan_npm(LOCK_V3.as_bytes(), &db);
        assert!(outcome.is_ok());
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].package.name, "lodash");
    }
}
