//! Container filesystems, obtained through `docker export`.

use crate::error::{Error, Result};
use crate::fs::ArchiveFs;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Exports the filesystem of `container` to a temporary tar file.
///
/// `command` is the docker-compatible CLI to run (`docker`, `podman`, ...).
/// The file is removed when the returned handle is dropped.
pub fn export_container(command: &str, container: &str) -> Result<NamedTempFile> {
    let export_error = |reason: String| Error::ContainerExport {
        container: container.to_string(),
        reason,
    };

    let temp = tempfile::Builder::new()
        .prefix("microscope_")
        .suffix(".tar")
        .tempfile()
        .map_err(|e| Error::io(std::env::temp_dir(), e))?;

    let mut output_arg = std::ffi::OsString::from("--output=");
    output_arg.push(temp.path());

    debug!(command, container, path = %temp.path().display(), "exporting container");
    let output = Command::new(command)
        .arg("export")
        .arg(output_arg)
        .arg(container)
        .output()
        .map_err(|e| export_error(format!("failed to execute {}: {}", command, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(export_error(format!(
            "{} exited with {}: {}",
            command,
            output.status,
            stderr.trim()
        )));
    }

    info!(container, "container exported");
    Ok(temp)
}

/// Exports `container` and loads the export as a filesystem.
pub fn open_container(command: &str, container: &str) -> Result<ArchiveFs> {
    let export = export_container(command, container)?;
    ArchiveFs::open_path(export.path())
}
