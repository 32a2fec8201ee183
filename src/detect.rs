//! Package manager detection.
//!
//! Each package manager leaves characteristic configuration paths behind.
//! Detection checks for them on the scanned root; it never fails, a path
//! that cannot be checked is simply treated as missing.

use crate::fs::Filesystem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    // OS native
    Apt,
    Apk,
    Dnf,
    Pacman,
    Xbps,

    // Sandboxed, distro agnostic
    Flatpak,
    Snap,
}

impl PackageManager {
    /// Every known package manager, in detection order.
    pub const ALL: [PackageManager; 7] = [
        PackageManager::Apt,
        PackageManager::Apk,
        PackageManager::Dnf,
        PackageManager::Pacman,
        PackageManager::Xbps,
        PackageManager::Flatpak,
        PackageManager::Snap,
    ];

    /// Paths whose presence means this package manager is in use.
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &["etc/apt/sources.list", "etc/apt/sources.list.d"],
            PackageManager::Apk => &["etc/apk/repositories"],
            PackageManager::Dnf => &["etc/yum.repos.d"],
            PackageManager::Pacman => &["etc/pacman.conf", "etc/pacman.d"],
            PackageManager::Xbps => &["usr/share/xbps.d"],
            PackageManager::Flatpak => &["var/lib/flatpak"],
            PackageManager::Snap => &["etc/snap"],
        }
    }

    /// Returns true if this package manager is present on `root`.
    pub fn exists_on(&self, root: &dyn Filesystem) -> bool {
        self.markers().iter().any(|marker| root.exists(marker))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PackageManager::Apt => "APT",
            PackageManager::Apk => "APK",
            PackageManager::Dnf => "DNF",
            PackageManager::Pacman => "Pacman",
            PackageManager::Xbps => "XBPS",
            PackageManager::Flatpak => "Flatpak",
            PackageManager::Snap => "Snap",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Returns the package managers in use on `root`, in detection order.
pub fn detect(root: &dyn Filesystem) -> Vec<PackageManager> {
    PackageManager::ALL
        .into_iter()
        .filter(|pm| pm.exists_on(root))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DirFs;
    use std::fs;

    #[test]
    fn test_detect_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect(&DirFs::new(dir.path())).is_empty());
    }

    #[test]
    fn test_detect_either_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/apt/sources.list.d")).unwrap();
        fs::create_dir_all(dir.path().join("etc/pacman.d")).unwrap();

        assert_eq!(
            detect(&DirFs::new(dir.path())),
            vec![PackageManager::Apt, PackageManager::Pacman]
        );
    }

    #[test]
    fn test_detect_keeps_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/snap")).unwrap();
        fs::create_dir_all(dir.path().join("etc/yum.repos.d")).unwrap();
        fs::create_dir_all(dir.path().join("etc/apk")).unwrap();
        fs::write(dir.path().join("etc/apk/repositories"), "").unwrap();

        assert_eq!(
            detect(&DirFs::new(dir.path())),
            vec![PackageManager::Apk, PackageManager::Dnf, PackageManager::Snap]
        );
    }

    #[test]
    fn test_missing_base_is_absence() {
        let fs = DirFs::new("/nonexistent/microscope/root");
        assert!(!PackageManager::Apt.exists_on(&fs));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(PackageManager::Xbps.to_string(), "XBPS");
        assert_eq!(PackageManager::Dnf.to_string(), "DNF");
    }
}
