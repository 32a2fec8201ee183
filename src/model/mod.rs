//! Core data types for packages, matches and scan reports.
//!
//! - [`Package`] - An installed package, or an advisory pattern
//! - [`FileVulnerability`] - A file whose hash is listed as vulnerable
//! - [`PackageVulnerability`] - A package matched by an advisory pattern
//! - [`ScanReport`] - Everything a run found
//!
//! # Example
//!
//! ```
//! use microscope::Package;
//!
//! let pkg = Package::from_nevra("bash-5.2.15-3.fc38.x86_64");
//! assert_eq!(pkg.name, "bash");
//! assert_eq!(pkg.version, "5.2.15");
//! ```

mod package;
mod vulnerability;

pub use package::*;
pub(crate) use package::cut;
pub use vulnerability::*;
