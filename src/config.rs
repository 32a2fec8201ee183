//! Configuration file handling.
//!
//! This module provides loading and saving of microscope configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/microscope/config.toml`
//! - macOS: `~/Library/Application Support/microscope/config.toml`
//! - Windows: `%APPDATA%\microscope\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! package_databases = ["/etc/microscope/packages.csv"]
//! file_databases = ["/etc/microscope/files.csv"]
//! default_format = "table"
//! parallel = true
//! docker_command = "docker"
//!
//! [ignore]
//! packages = ["linux-image-*"]
//! paths = ["usr/share/doc/*"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{FileVulnerability, PackageVulnerability, ScanReport};

/// Application configuration.
///
/// It can be loaded from a TOML file or created with default values.
///
/// # Example
///
/// ```no_run
/// use microscope::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Package advisories: {:?}", config.package_databases);
/// println!("Parallel: {}", config.parallel);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package advisory CSVs loaded on every run, in addition to `--pkgdb`.
    pub package_databases: Vec<PathBuf>,

    /// File hash advisory CSVs loaded on every run, in addition to `--db`.
    pub file_databases: Vec<PathBuf>,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "text"
    /// Default: "table"
    pub default_format: String,

    /// Whether independent scan targets run concurrently.
    ///
    /// Default: true
    pub parallel: bool,

    /// Docker-compatible CLI used to export containers.
    ///
    /// Default: "docker"
    pub docker_command: String,

    /// Ignore list configuration for suppressing known issues.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// The `[ignore]` table: matches dropped from the report after scanning.
///
/// Patterns are exact strings or `*` globs. Files are still hashed and
/// packages still checked; only the reported matches are filtered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names, e.g. `linux-image-*` or `@types/*`.
    pub packages: Vec<String>,

    /// File paths relative to the scanned root, e.g. `usr/share/doc/*`.
    pub paths: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        matches_any(&self.packages, name)
    }

    pub fn should_ignore_path(&self, path: &str) -> bool {
        matches_any(&self.paths, path)
    }

    /// Removes matches on ignored package names and file paths.
    pub fn apply(&self, report: &mut ScanReport) {
        report
            .files
            .retain(|v: &FileVulnerability| !self.should_ignore_path(&v.name));
        report
            .packages
            .retain(|v: &PackageVulnerability| !self.should_ignore_package(&v.package.name));
    }
}

fn matches_any(patterns: &[String], text: &str) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.contains('*') {
            glob_match(pattern, text)
        } else {
            pattern == text
        }
    })
}

/// `*` matches any run of characters, including none. The pieces between
/// stars must appear in order; the first and last are anchored.
fn glob_match(pattern: &str, text: &str) -> bool {
    let Some((head, rest)) = pattern.split_once('*') else {
        return pattern == text;
    };
    let Some(mut remaining) = text.strip_prefix(head) else {
        return false;
    };

    let mut pieces: Vec<&str> = rest.split('*').collect();
    let tail = pieces.pop().unwrap_or_default();
    let Some(body) = remaining.strip_suffix(tail) else {
        return false;
    };
    remaining = body;

    for piece in pieces.into_iter().filter(|p| !p.is_empty()) {
        match remaining.find(piece) {
            Some(pos) => remaining = &remaining[pos + piece.len()..],
            None => return false,
        }
    }
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package_databases: Vec::new(),
            file_databases: Vec::new(),
            default_format: "table".to_string(),
            parallel: true,
            docker_command: "docker".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`; a missing file means defaults.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use microscope::Config;
    ///
    /// let path = Config::config_path();
    /// println!("Config file: {}", path.display());
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("microscope")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Package, LOCAL_SOURCE};

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("openssl", "openssl"));
        assert!(!glob_match("openssl", "libssl3"));
    }

    #[test]
    fn test_glob_match_prefix() {
        assert!(glob_match("linux-image-*", "linux-image-6.1.0-18-amd64"));
        assert!(!glob_match("linux-image-*", "linux-headers-6.1.0"));
    }

    #[test]
    fn test_glob_match_suffix() {
        assert!(glob_match("*-doc", "python3-doc"));
        assert!(!glob_match("*-doc", "python3"));
    }

    #[test]
    fn test_glob_match_pieces_do_not_overlap() {
        assert!(glob_match("lib*ssl*3", "libssl3"));
        assert!(!glob_match("a*a", "a"));
        assert!(!glob_match("*ab*ba*", "aba"));
    }

    #[test]
    fn test_glob_match_contains() {
        assert!(glob_match("*ssl*", "libssl3"));
        assert!(!glob_match("*ssl*", "zlib"));
    }

    #[test]
    fn test_ignore_paths() {
        let config = IgnoreConfig {
            packages: vec![],
            paths: vec!["usr/share/doc/*".to_string(), "etc/motd".to_string()],
        };

        assert!(config.should_ignore_path("usr/share/doc/bash/README"));
        assert!(config.should_ignore_path("etc/motd"));
        assert!(!config.should_ignore_path("usr/bin/bash"));
    }

    #[test]
    fn test_apply_filters_report() {
        let config = IgnoreConfig {
            packages: vec!["@types/*".to_string()],
            paths: vec!["tmp/*".to_string()],
        };

        let mut report = ScanReport::new();
        report.packages = vec![
            PackageVulnerability {
                package: Package::new("@types/node", "20.1.0"),
                source: LOCAL_SOURCE.to_string(),
                reason: "x".to_string(),
            },
            PackageVulnerability {
                package: Package::new("curl", "8.0.1"),
                source: LOCAL_SOURCE.to_string(),
                reason: "y".to_string(),
            },
        ];
        report.files = vec![FileVulnerability {
            name: "tmp/payload".to_string(),
            hash: "00".to_string(),
            source: LOCAL_SOURCE.to_string(),
            reason: "z".to_string(),
        }];

        config.apply(&mut report);
        assert_eq!(report.packages.len(), 1);
        assert_eq!(report.packages[0].package.name, "curl");
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.default_format, "table");
        assert!(config.parallel);
        assert_eq!(config.docker_command, "docker");
        assert!(config.package_databases.is_empty());
        assert!(config.ignore.packages.is_empty());
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.parallel);
    }

    #[test]
    fn test_load_from_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "package_databases = \"not a list\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str("parallel = false\n[ignore]\npaths = [\"a/*\"]\n").unwrap();
        assert!(!config.parallel);
        assert_eq!(config.default_format, "table");
        assert_eq!(config.ignore.paths, vec!["a/*".to_string()]);
    }
}
