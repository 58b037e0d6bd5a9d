/// Run history: bounded JSON log of backup outcomes
///
/// One record per completed run, newest last, trimmed to HISTORY_LIMIT.
/// Lives in the user config dir next to config.toml. Errors are stored
/// as display strings; credential material never enters a record.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::orchestrator::BackupRunResult;
use crate::utils::HISTORY_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub config_id: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: String,
    pub db_dumped: bool,
    pub db_error: Option<String>,
    pub archived: bool,
    pub archive_error: Option<String>,
    pub snapshots_deleted: Vec<String>,
    pub deletes_failed: Vec<String>,
    pub elapsed_secs: u64,
}

impl RunRecord {
    pub fn from_result(result: &BackupRunResult) -> Self {
        Self {
            config_id: result.config_id.clone(),
            timestamp: Utc::now(),
            snapshot: result.snapshot.clone(),
            db_dumped: result.db_dumped,
            db_error: result.db_error.as_ref().map(|e| e.to_string()),
            archived: result.archived,
            archive_error: result.archive_error.as_ref().map(|e| e.to_string()),
            snapshots_deleted: result.retention.deleted.clone(),
            deletes_failed: result
                .retention
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.snapshot, f.reason))
                .collect(),
            elapsed_secs: result.elapsed.as_secs(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.db_error.is_none() && self.archived && self.deletes_failed.is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunHistory {
    pub records: Vec<RunRecord>,
}

impl RunHistory {
    /// Default history file, next to config.toml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wpvault");
        Ok(config_dir.join("history.json"))
    }

    /// Load from file or start empty
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Append a record, keeping only the newest HISTORY_LIMIT entries
    pub fn append(&mut self, record: RunRecord) {
        self.records.push(record);
        if self.records.len() > HISTORY_LIMIT {
            let excess = self.records.len() - HISTORY_LIMIT;
            self.records.drain(..excess);
        }
    }

    /// Newest-first records, optionally for one configuration
    pub fn recent(&self, config_id: Option<&str>, limit: usize) -> Vec<&RunRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| config_id.map_or(true, |id| r.config_id == id))
            .take(limit)
            .collect()
    }
}
