pub mod config;
pub mod database;
pub mod detect;
pub mod docker;
pub mod error;
pub mod fs;
pub mod model;
pub mod output;
pub mod scanner;

pub use config::Config;
pub use database::AdvisoryDatabase;
pub use detect::{detect, PackageManager};
pub use error::{Error, Result};
pub use model::{FileVulnerability, Package, PackageVulnerability, ScanReport};
pub use scanner::{PackageReader, ScanOutcome};
