/// Prerequisite installation and full uninstall
///
/// Both are one-shot collaborators of the backup pipeline: installing the
/// database dump client, and removing every snapshot this tool ever made.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::utils::DUMP_TOOL;

#[derive(Debug, PartialEq)]
pub enum InstallOutcome {
    AlreadyPresent,
    Installed,
}

/// Whether the dump tool can be executed at all
pub fn dump_tool_available() -> bool {
    Command::new(DUMP_TOOL)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Install the database dump client unless it is already present
pub fn install_dependencies() -> Result<InstallOutcome> {
    if dump_tool_available() {
        return Ok(InstallOutcome::AlreadyPresent);
    }

    let status = Command::new("sudo")
        .args(["apt-get", "install", "-y", "mysql-client"])
        .status()
        .context("Failed to run apt-get")?;

    if !status.success() {
        bail!("package install failed (exit {})", status);
    }

    Ok(InstallOutcome::Installed)
}

/// Remove the whole backup root. Returns false when there was nothing
/// to remove.
pub fn uninstall<P: AsRef<Path>>(backup_root: P) -> Result<bool> {
    let root = backup_root.as_ref();
    if !root.exists() {
        return Ok(false);
    }

    fs::remove_dir_all(root)
        .with_context(|| format!("Failed to remove {}", root.display()))?;

    Ok(true)
}
