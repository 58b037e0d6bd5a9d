/// File archive step
///
/// Produces one compressed archive of a site's whole file tree, relative
/// paths preserved (`tar -czf <archive> -C <source> .`).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::error::BackupError;
use crate::utils::{stderr_tail, ARCHIVE_FILENAME, ARCHIVE_TOOL, EXTERNAL_TOOL_TIMEOUT_SECS};

pub struct FileArchiver {
    tool: PathBuf,
    timeout: Duration,
}

impl FileArchiver {
    pub fn new() -> Self {
        Self {
            tool: PathBuf::from(ARCHIVE_TOOL),
            timeout: Duration::from_secs(EXTERNAL_TOOL_TIMEOUT_SECS),
        }
    }

    /// Substitute the archive tool and time bound (tests use stub executables)
    pub fn with_tool<P: AsRef<Path>>(tool: P, timeout: Duration) -> Self {
        Self {
            tool: tool.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Archive `source_dir` into `dest_dir/files.tar.gz`
    pub async fn archive(&self, source_dir: &Path, dest_dir: &Path) -> Result<(), BackupError> {
        if !source_dir.is_dir() {
            return Err(BackupError::SourceNotFound(source_dir.to_path_buf()));
        }

        let archive_file = dest_dir.join(ARCHIVE_FILENAME);

        let child = Command::new(&self.tool)
            .arg("-czf")
            .arg(&archive_file)
            .arg("-C")
            .arg(source_dir)
            .arg(".")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackupError::ArchiveFailed {
                exit_code: -1,
                stderr_tail: format!("failed to spawn {}: {}", self.tool.display(), e),
            })?;

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => Err(BackupError::ArchiveFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr_tail: stderr_tail(&output.stderr, 5),
            }),
            Ok(Err(e)) => Err(BackupError::ArchiveFailed {
                exit_code: -1,
                stderr_tail: format!("failed to wait for {}: {}", self.tool.display(), e),
            }),
            Err(_) => Err(BackupError::ArchiveFailed {
                exit_code: -1,
                stderr_tail: format!(
                    "timed out after {}",
                    humantime::format_duration(self.timeout)
                ),
            }),
        }
    }
}

impl Default for FileArchiver {
    fn default() -> Self {
        Self::new()
    }
}
