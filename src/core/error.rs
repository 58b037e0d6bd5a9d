/// Failure taxonomy for the backup pipeline
///
/// Fatal variants (configuration resolution, snapshot directory creation)
/// abort a run before anything else happens. The step failures
/// (dump, archive, snapshot listing) are collected into the run result
/// instead of being raised, so one broken step never blocks the others.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("configuration '{0}' not found in registry")]
    ConfigNotFound(String),

    #[error("configuration '{id}': required field {field} is missing or invalid")]
    ConfigFieldMissing { id: String, field: &'static str },

    #[error("failed to create snapshot directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database dump failed (exit code {exit_code}): {stderr_tail}")]
    DumpFailed { exit_code: i32, stderr_tail: String },

    #[error("source directory {0} does not exist or is not a directory")]
    SourceNotFound(PathBuf),

    #[error("file archive failed (exit code {exit_code}): {stderr_tail}")]
    ArchiveFailed { exit_code: i32, stderr_tail: String },

    #[error("failed to list snapshots under {path}: {source}")]
    SnapshotListFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
