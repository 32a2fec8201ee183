use super::{scan_package_reader, PackageReader, ScanOutcome};
use crate::database::PackageChecker;
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::model::{Package, PackageVulnerability};
use rusqlite::{Connection, OpenFlags, Rows};
use std::io;
use tempfile::NamedTempFile;
use tracing::debug;

/// The SQLite cache DNF keeps of installed packages.
pub const DNF_PACKAGE_DB: &str = "var/cache/dnf/packages.db";

/// One row per installed package; the first column is the
/// `name-version-release.arch` string.
pub const DNF_QUERY: &str = "SELECT * FROM installed";

/// Reads rows of [`DNF_QUERY`].
///
/// The rows only carry a concatenated `name-version-release.arch` string, so
/// the name ends at the first dash followed by a digit; release and
/// architecture are dropped.
pub struct DnfListReader<'stmt> {
    rows: Rows<'stmt>,
}

impl<'stmt> DnfListReader<'stmt> {
    pub fn new(rows: Rows<'stmt>) -> Self {
        Self { rows }
    }
}

impl PackageReader for DnfListReader<'_> {
    fn next_package(&mut self) -> Result<Option<Package>> {
        while let Some(row) = self.rows.next()? {
            let raw: String = row.get(0)?;
            let package = Package::from_nevra(&raw);
            if !package.name.is_empty() {
                return Ok(Some(package));
            }
        }
        Ok(None)
    }
}

/// Scans the packages recorded in the DNF package cache.
///
/// SQLite needs a real file, so the database is copied out of the scanned
/// filesystem into a temporary file first.
pub fn scan_dnf(
    filesystem: &dyn Filesystem,
    checker: &dyn PackageChecker,
) -> ScanOutcome<PackageVulnerability> {
    with_package_db(filesystem, |reader| scan_package_reader(reader, checker))
        .unwrap_or_else(ScanOutcome::failed)
}

fn with_package_db<T, F>(filesystem: &dyn Filesystem, f: F) -> Result<T>
where
    F: FnOnce(&mut DnfListReader<'_>) -> T,
{
    let (_temp, conn) = extract_database(filesystem)?;
    let mut stmt = conn.prepare(DNF_QUERY)?;
    let mut reader = DnfListReader::new(stmt.query([])?);
    Ok(f(&mut reader))
}

fn extract_database(filesystem: &dyn Filesystem) -> Result<(NamedTempFile, Connection)> {
    let mut input = filesystem.open(DNF_PACKAGE_DB)?;

    let mut temp = tempfile::Builder::new()
        .prefix("microscope_")
        .suffix(".db")
        .tempfile()
        .map_err(|e| Error::io(std::env::temp_dir(), e))?;
    let copied = io::copy(&mut input, temp.as_file_mut()).map_err(|e| Error::io(temp.path(), e))?;
    debug!(bytes = copied, path = %temp.path().display(), "extracted DNF package database");

    let conn = Connection::open_with_flags(temp.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok((temp, conn))
}
