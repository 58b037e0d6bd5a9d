/// Retention enforcement: delete all but the newest N snapshots per site
///
/// Only timestamped snapshot directories participate. Stray files and
/// foreign directories under a site's backup directory are never counted
/// against the limit and never deleted.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::BackupError;
use crate::utils::is_snapshot_name;

/// Decides which snapshots are expendable. `sorted_names` arrives
/// newest first; everything returned gets deleted.
pub trait RetentionPolicy {
    fn select_victims(&self, sorted_names: &[String]) -> Vec<String>;
}

/// Keep the `limit` most recent snapshots, expire the rest
pub struct KeepMostRecent {
    pub limit: usize,
}

impl RetentionPolicy for KeepMostRecent {
    fn select_victims(&self, sorted_names: &[String]) -> Vec<String> {
        sorted_names.iter().skip(self.limit).cloned().collect()
    }
}

/// Per-snapshot outcome of one enforcement pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetentionReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDelete>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDelete {
    pub snapshot: String,
    pub reason: String,
}

impl RetentionReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct RetentionManager {
    backup_root: PathBuf,
}

impl RetentionManager {
    pub fn new<P: AsRef<Path>>(backup_root: P) -> Self {
        Self {
            backup_root: backup_root.as_ref().to_path_buf(),
        }
    }

    /// Delete everything older than the `limit` newest snapshots for one site
    pub fn enforce(&self, config_id: &str, limit: usize) -> Result<RetentionReport, BackupError> {
        self.enforce_with(config_id, &KeepMostRecent { limit })
    }

    /// Same, with a caller-supplied selection policy
    pub fn enforce_with(
        &self,
        config_id: &str,
        policy: &dyn RetentionPolicy,
    ) -> Result<RetentionReport, BackupError> {
        let site_dir = self.backup_root.join(config_id);
        if !site_dir.is_dir() {
            return Ok(RetentionReport::default());
        }

        let listing = |e| BackupError::SnapshotListFailed {
            path: site_dir.clone(),
            source: e,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&site_dir).map_err(listing)? {
            let entry = entry.map_err(listing)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && is_snapshot_name(&name) {
                names.push(name);
            }
        }

        // Newest first; the fixed-width timestamp makes lexicographic
        // order chronological
        names.sort_unstable_by(|a, b| b.cmp(a));

        let victims = policy.select_victims(&names);
        let mut report = RetentionReport {
            kept: names
                .iter()
                .filter(|n| !victims.contains(n))
                .cloned()
                .collect(),
            ..Default::default()
        };

        // One failed candidate never aborts the rest
        for name in victims {
            match fs::remove_dir_all(site_dir.join(&name)) {
                Ok(()) => report.deleted.push(name),
                Err(e) => report.failed.push(FailedDelete {
                    snapshot: name,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }
}
