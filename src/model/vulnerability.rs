use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Package;

/// Source recorded on every match found in the local advisory database.
pub const LOCAL_SOURCE: &str = "Local database";

/// A file whose content hash is listed in the advisory database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVulnerability {
    /// Path of the file inside the scanned filesystem.
    pub name: String,
    /// Hex-encoded SHA-256 of the file content.
    pub hash: String,
    pub source: String,
    pub reason: String,
}

impl std::fmt::Display for FileVulnerability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.name, self.hash, self.source, self.reason
        )
    }
}

/// An installed package matched by an advisory pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVulnerability {
    pub package: Package,
    pub source: String,
    pub reason: String,
}

impl std::fmt::Display for PackageVulnerability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.package, self.source, self.reason)
    }
}

/// Everything a single run found, in the order it was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    pub files: Vec<FileVulnerability>,
    pub packages: Vec<PackageVulnerability>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

impl ScanReport {
    pub fn new() -> Self {
        Self {
            scan_time: Utc::now(),
            files: Vec::new(),
            packages: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn vulnerability_count(&self) -> usize {
        self.files.len() + self.packages.len()
    }

    /// True when nothing matched and nothing failed.
    pub fn is_clean(&self) -> bool {
        self.vulnerability_count() == 0 && self.errors.is_empty()
    }
}

impl Default for ScanReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_vulnerability_display_is_tab_separated() {
        let vuln = FileVulnerability {
            name: "usr/bin/xz".to_string(),
            hash: "abc123".to_string(),
            source: LOCAL_SOURCE.to_string(),
            reason: "CVE-2024-3094".to_string(),
        };
        assert_eq!(
            vuln.to_string(),
            "usr/bin/xz\tabc123\tLocal database\tCVE-2024-3094"
        );
    }

    #[test]
    fn test_package_vulnerability_display() {
        let vuln = PackageVulnerability {
            package: Package::new("xz-utils", "5.6.0").with_release("1"),
            source: LOCAL_SOURCE.to_string(),
            reason: "backdoor".to_string(),
        };
        assert_eq!(
            vuln.to_string(),
            "xz-utils-5.6.0-1:\tLocal database\tbackdoor"
        );
    }

    #[test]
    fn test_report_clean() {
        let mut report = ScanReport::new();
        assert!(report.is_clean());

        report.errors.push("io error".to_string());
        assert!(!report.is_clean());
        assert_eq!(report.vulnerability_count(), 0);
    }
}
