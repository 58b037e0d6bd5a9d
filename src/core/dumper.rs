/// Database dump step
///
/// Spawns the dump tool with a structured argument list. The password
/// reaches the child through MYSQL_PWD, so it never appears on a command
/// line, in process listings, or in any output of this program.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::error::BackupError;
use crate::core::registry::BackupConfiguration;
use crate::utils::{stderr_tail, DB_DUMP_FILENAME, DUMP_TOOL, EXTERNAL_TOOL_TIMEOUT_SECS};

pub struct DatabaseDumper {
    tool: PathBuf,
    timeout: Duration,
}

impl DatabaseDumper {
    pub fn new() -> Self {
        Self {
            tool: PathBuf::from(DUMP_TOOL),
            timeout: Duration::from_secs(EXTERNAL_TOOL_TIMEOUT_SECS),
        }
    }

    /// Substitute the dump tool and time bound (tests use stub executables)
    pub fn with_tool<P: AsRef<Path>>(tool: P, timeout: Duration) -> Self {
        Self {
            tool: tool.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Dump the configuration's database into `dest_dir/db.sql`
    pub async fn dump(
        &self,
        config: &BackupConfiguration,
        dest_dir: &Path,
    ) -> Result<(), BackupError> {
        let dump_file = dest_dir.join(DB_DUMP_FILENAME);
        let stdout = std::fs::File::create(&dump_file).map_err(|e| BackupError::DumpFailed {
            exit_code: -1,
            stderr_tail: format!("cannot create {}: {}", dump_file.display(), e),
        })?;

        let child = Command::new(&self.tool)
            .arg("-h")
            .arg(&config.db_host)
            .arg("-P")
            .arg(config.db_port.to_string())
            .arg("-u")
            .arg(&config.db_user)
            .arg(&config.db_name)
            .env("MYSQL_PWD", &config.db_password)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackupError::DumpFailed {
                exit_code: -1,
                stderr_tail: format!("failed to spawn {}: {}", self.tool.display(), e),
            })?;

        // Dropping the timed-out future kills the child (kill_on_drop)
        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => Err(BackupError::DumpFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr_tail: stderr_tail(&output.stderr, 5),
            }),
            Ok(Err(e)) => Err(BackupError::DumpFailed {
                exit_code: -1,
                stderr_tail: format!("failed to wait for {}: {}", self.tool.display(), e),
            }),
            Err(_) => Err(BackupError::DumpFailed {
                exit_code: -1,
                stderr_tail: format!(
                    "timed out after {}",
                    humantime::format_duration(self.timeout)
                ),
            }),
        }
    }
}

impl Default for DatabaseDumper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn test_config() -> BackupConfiguration {
        BackupConfiguration {
            id: "site1".to_string(),
            source_dir: PathBuf::from("/var/www/site1"),
            db_name: "site1_db".to_string(),
            db_user: "site1_user".to_string(),
            db_password: "hunter2".to_string(),
            db_host: "localhost".to_string(),
            db_port: 3306,
            include_db: true,
            max_backups: 3,
        }
    }

    fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_dump_writes_fixed_named_file() {
        let dir = TempDir::new().unwrap();
        let stub = write_stub(
            dir.path(),
            "mysqldump-ok",
            "#!/bin/sh\necho \"-- dump of $MYSQL_PWD\"\n",
        );

        let dumper = DatabaseDumper::with_tool(&stub, Duration::from_secs(10));
        dumper.dump(&test_config(), dir.path()).await.unwrap();

        let dump = fs::read_to_string(dir.path().join(DB_DUMP_FILENAME)).unwrap();
        assert!(dump.contains("hunter2"), "password env reached the child");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_code_and_stderr() {
        let dir = TempDir::new().unwrap();
        let stub = write_stub(
            dir.path(),
            "mysqldump-fail",
            "#!/bin/sh\necho 'access denied for user' >&2\nexit 3\n",
        );

        let dumper = DatabaseDumper::with_tool(&stub, Duration::from_secs(10));
        match dumper.dump(&test_config(), dir.path()).await {
            Err(BackupError::DumpFailed {
                exit_code,
                stderr_tail,
            }) => {
                assert_eq!(exit_code, 3);
                assert!(stderr_tail.contains("access denied"));
            }
            other => panic!("expected DumpFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_tool_reports_dump_failed() {
        let dir = TempDir::new().unwrap();
        let dumper =
            DatabaseDumper::with_tool("/nonexistent/mysqldump", Duration::from_secs(10));

        assert!(matches!(
            dumper.dump(&test_config(), dir.path()).await,
            Err(BackupError::DumpFailed { exit_code: -1, .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_failure() {
        let dir = TempDir::new().unwrap();
        let stub = write_stub(dir.path(), "mysqldump-slow", "#!/bin/sh\nsleep 5\n");

        let dumper = DatabaseDumper::with_tool(&stub, Duration::from_millis(100));
        match dumper.dump(&test_config(), dir.path()).await {
            Err(BackupError::DumpFailed { stderr_tail, .. }) => {
                assert!(stderr_tail.contains("timed out"));
            }
            other => panic!("expected DumpFailed, got {:?}", other),
        }
    }
}
