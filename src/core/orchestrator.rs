/// One backup run per configuration ID
///
/// Step order: resolve configuration, create the snapshot directory,
/// dump the database (when enabled), archive the file tree, enforce
/// retention. Configuration and directory-creation failures are fatal;
/// everything after that is recorded in the result and never aborts
/// the remaining steps.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::core::archiver::FileArchiver;
use crate::core::dumper::DatabaseDumper;
use crate::core::error::BackupError;
use crate::core::registry::ConfigRegistry;
use crate::core::retention::{RetentionManager, RetentionReport};
use crate::utils::snapshot_timestamp;

/// Aggregate outcome of one run. Non-fatal step failures live here
/// instead of being raised, so a caller can tell "database dump failed
/// but the files were still archived" from total failure.
#[derive(Debug)]
pub struct BackupRunResult {
    pub config_id: String,
    pub snapshot: String,
    pub snapshot_path: PathBuf,
    pub db_dumped: bool,
    pub db_error: Option<BackupError>,
    pub archived: bool,
    pub archive_error: Option<BackupError>,
    pub retention: RetentionReport,
    pub retention_error: Option<BackupError>,
    pub elapsed: Duration,
}

impl BackupRunResult {
    /// True when every attempted step succeeded
    pub fn is_clean(&self) -> bool {
        self.db_error.is_none()
            && self.archived
            && self.retention_error.is_none()
            && !self.retention.has_failures()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "config_id": self.config_id,
            "snapshot": self.snapshot,
            "snapshot_path": self.snapshot_path,
            "db_dumped": self.db_dumped,
            "db_error": self.db_error.as_ref().map(|e| e.to_string()),
            "archived": self.archived,
            "archive_error": self.archive_error.as_ref().map(|e| e.to_string()),
            "retention": self.retention,
            "retention_error": self.retention_error.as_ref().map(|e| e.to_string()),
            "elapsed_secs": self.elapsed.as_secs(),
        })
    }
}

pub struct BackupOrchestrator {
    registry: ConfigRegistry,
    dumper: DatabaseDumper,
    archiver: FileArchiver,
    retention: RetentionManager,
    backup_root: PathBuf,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BackupOrchestrator {
    pub fn new<P: AsRef<Path>>(registry: ConfigRegistry, backup_root: P) -> Self {
        Self::with_components(
            registry,
            backup_root,
            DatabaseDumper::new(),
            FileArchiver::new(),
        )
    }

    /// Substitute the external tool drivers (tests use stub executables)
    pub fn with_components<P: AsRef<Path>>(
        registry: ConfigRegistry,
        backup_root: P,
        dumper: DatabaseDumper,
        archiver: FileArchiver,
    ) -> Self {
        let backup_root = backup_root.as_ref().to_path_buf();
        Self {
            retention: RetentionManager::new(&backup_root),
            registry,
            dumper,
            archiver,
            backup_root,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Enforce retention for one site without taking a new backup
    pub fn prune(&self, config_id: &str) -> Result<RetentionReport, BackupError> {
        let config = self.registry.get(config_id)?;
        self.retention.enforce(config_id, config.max_backups)
    }

    /// Run one backup for `config_id`
    pub async fn run_backup(&self, config_id: &str) -> Result<BackupRunResult, BackupError> {
        // Two runs of the same ID would race on the snapshot listing;
        // distinct IDs proceed independently.
        let lock = self.lock_for(config_id);
        let _guard = lock.lock().await;

        let started = Instant::now();

        let config = self.registry.get(config_id)?;

        let snapshot = snapshot_timestamp();
        let snapshot_path = self.backup_root.join(config_id).join(&snapshot);
        fs::create_dir_all(&snapshot_path).map_err(|e| BackupError::DirectoryCreateFailed {
            path: snapshot_path.clone(),
            source: e,
        })?;

        let (db_dumped, db_error) = if config.include_db {
            match self.dumper.dump(&config, &snapshot_path).await {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e)),
            }
        } else {
            (false, None)
        };

        let (archived, archive_error) =
            match self.archiver.archive(&config.source_dir, &snapshot_path).await {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e)),
            };

        let (retention, retention_error) =
            match self.retention.enforce(config_id, config.max_backups) {
                Ok(report) => (report, None),
                Err(e) => (RetentionReport::default(), Some(e)),
            };

        Ok(BackupRunResult {
            config_id: config_id.to_string(),
            snapshot,
            snapshot_path,
            db_dumped,
            db_error,
            archived,
            archive_error,
            retention,
            retention_error,
            elapsed: started.elapsed(),
        })
    }

    fn lock_for(&self, config_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(config_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    use crate::utils::{ARCHIVE_FILENAME, DB_DUMP_FILENAME};

    struct Fixture {
        _work: TempDir,
        root: PathBuf,
        source: PathBuf,
        stubs: PathBuf,
    }

    /// A registry file, a site source tree, a backup root, and a stub
    /// directory, all inside one temp dir
    fn fixture(include_db: &str, max_backups: usize) -> (Fixture, ConfigRegistry) {
        let work = TempDir::new().unwrap();
        let source = work.path().join("site-src");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("index.php"), "<?php ?>").unwrap();

        let root = work.path().join("backups");
        let stubs = work.path().join("stubs");
        fs::create_dir(&stubs).unwrap();

        let registry_file = work.path().join("backup_details.cfg");
        fs::write(
            &registry_file,
            format!(
                "[site1]\nWP_DIR = {}\nDB_NAME = site1_db\nDB_USER = u\nDB_HOST = localhost\n\
                 DB_PORT = 3306\nDB_PASSWORD = pw\nINCLUDE_DB = {}\nMAX_BACKUPS = {}\n",
                source.display(),
                include_db,
                max_backups
            ),
        )
        .unwrap();

        let registry = ConfigRegistry::load(&registry_file).unwrap();
        (
            Fixture {
                _work: work,
                root,
                source,
                stubs,
            },
            registry,
        )
    }

    fn stub(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn ok_dumper(fx: &Fixture) -> DatabaseDumper {
        let tool = stub(&fx.stubs, "dump-ok", "#!/bin/sh\necho '-- dump'\n");
        DatabaseDumper::with_tool(tool, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_clean_run_produces_both_artifacts() {
        let (fx, registry) = fixture("yes", 3);
        let orchestrator = BackupOrchestrator::with_components(
            registry,
            &fx.root,
            ok_dumper(&fx),
            FileArchiver::new(),
        );

        let result = orchestrator.run_backup("site1").await.unwrap();

        assert!(result.is_clean());
        assert!(result.db_dumped);
        assert!(result.archived);
        assert!(result.snapshot_path.join(DB_DUMP_FILENAME).is_file());
        assert!(result.snapshot_path.join(ARCHIVE_FILENAME).is_file());
        assert_eq!(result.retention.kept, vec![result.snapshot.clone()]);
    }

    #[tokio::test]
    async fn test_config_not_found_creates_no_directory() {
        let (fx, registry) = fixture("yes", 3);
        let orchestrator = BackupOrchestrator::new(registry, &fx.root);

        match orchestrator.run_backup("ghost").await {
            Err(BackupError::ConfigNotFound(id)) => assert_eq!(id, "ghost"),
            other => panic!("expected ConfigNotFound, got {:?}", other),
        }

        assert!(!fx.root.exists(), "no snapshot directory on fatal config error");
    }

    #[tokio::test]
    async fn test_malformed_config_creates_no_directory() {
        let (fx, registry) = fixture("maybe", 3);
        let orchestrator = BackupOrchestrator::new(registry, &fx.root);

        assert!(matches!(
            orchestrator.run_backup("site1").await,
            Err(BackupError::ConfigFieldMissing { field: "INCLUDE_DB", .. })
        ));
        assert!(!fx.root.exists());
    }

    #[tokio::test]
    async fn test_database_disabled_skips_dumper() {
        let (fx, registry) = fixture("no", 3);
        // Dump tool that would blow up if ever invoked
        let dumper = DatabaseDumper::with_tool(
            stub(&fx.stubs, "dump-boom", "#!/bin/sh\nexit 99\n"),
            Duration::from_secs(10),
        );
        let orchestrator =
            BackupOrchestrator::with_components(registry, &fx.root, dumper, FileArchiver::new());

        let result = orchestrator.run_backup("site1").await.unwrap();

        assert!(!result.db_dumped);
        assert!(result.db_error.is_none());
        assert!(result.archived);
        assert!(!result.snapshot_path.join(DB_DUMP_FILENAME).exists());
    }

    #[tokio::test]
    async fn test_dump_failure_does_not_stop_archive_or_retention() {
        let (fx, registry) = fixture("yes", 1);

        // Pre-seed old snapshots so retention has candidates
        for name in ["20240101_010000", "20240102_010000"] {
            fs::create_dir_all(fx.root.join("site1").join(name)).unwrap();
        }

        let dumper = DatabaseDumper::with_tool(
            stub(&fx.stubs, "dump-fail", "#!/bin/sh\necho 'connect error' >&2\nexit 2\n"),
            Duration::from_secs(10),
        );
        let orchestrator =
            BackupOrchestrator::with_components(registry, &fx.root, dumper, FileArchiver::new());

        let result = orchestrator.run_backup("site1").await.unwrap();

        assert!(!result.db_dumped);
        assert!(matches!(
            result.db_error,
            Some(BackupError::DumpFailed { exit_code: 2, .. })
        ));
        assert!(result.archived, "archive still ran");
        assert!(result.snapshot_path.join(ARCHIVE_FILENAME).is_file());

        // Retention still ran: limit 1 keeps only the new snapshot
        assert_eq!(
            result.retention.deleted,
            vec!["20240102_010000", "20240101_010000"]
        );
        assert_eq!(result.retention.kept, vec![result.snapshot.clone()]);
    }

    #[tokio::test]
    async fn test_archive_failure_is_recorded_and_retention_still_runs() {
        let (fx, registry) = fixture("no", 1);

        for name in ["20240101_010000", "20240102_010000"] {
            fs::create_dir_all(fx.root.join("site1").join(name)).unwrap();
        }

        let archiver = FileArchiver::with_tool("/bin/false", Duration::from_secs(10));
        let orchestrator = BackupOrchestrator::with_components(
            registry,
            &fx.root,
            DatabaseDumper::new(),
            archiver,
        );

        let result = orchestrator.run_backup("site1").await.unwrap();

        assert!(!result.archived);
        assert!(matches!(
            result.archive_error,
            Some(BackupError::ArchiveFailed { .. })
        ));
        assert!(!result.is_clean());

        assert_eq!(
            result.retention.deleted,
            vec!["20240102_010000", "20240101_010000"]
        );
    }

    #[tokio::test]
    async fn test_missing_source_surfaces_in_result() {
        let (fx, registry) = fixture("no", 3);
        fs::remove_dir_all(&fx.source).unwrap();

        let orchestrator = BackupOrchestrator::new(registry, &fx.root);
        let result = orchestrator.run_backup("site1").await.unwrap();

        assert!(!result.archived);
        assert!(matches!(
            result.archive_error,
            Some(BackupError::SourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_prune_without_backup() {
        let (fx, registry) = fixture("yes", 1);
        for name in ["20240101_010000", "20240102_010000", "20240103_010000"] {
            fs::create_dir_all(fx.root.join("site1").join(name)).unwrap();
        }

        let orchestrator = BackupOrchestrator::new(registry, &fx.root);
        let report = orchestrator.prune("site1").unwrap();

        assert_eq!(report.kept, vec!["20240103_010000"]);
        assert_eq!(report.deleted, vec!["20240102_010000", "20240101_010000"]);
    }

    #[tokio::test]
    async fn test_json_view_renders_errors_as_strings() {
        let (fx, registry) = fixture("no", 3);
        let archiver = FileArchiver::with_tool("/bin/false", Duration::from_secs(10));
        let orchestrator = BackupOrchestrator::with_components(
            registry,
            &fx.root,
            DatabaseDumper::new(),
            archiver,
        );

        let result = orchestrator.run_backup("site1").await.unwrap();
        let json = result.to_json();

        assert_eq!(json["config_id"], "site1");
        assert_eq!(json["archived"], false);
        assert!(json["archive_error"].as_str().unwrap().contains("exit code"));
        assert_eq!(json["db_error"], serde_json::Value::Null);
    }
}
