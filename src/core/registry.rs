/// Configuration registry for protected sites
///
/// Parses the INI-style registry file: one `[section]` per site,
/// KEY=VALUE lines inside, `#`/`;` comments. The registry is read-only
/// at runtime; nothing here mutates the file.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::BackupError;

/// One site's backup settings, immutable once loaded
#[derive(Debug, Clone)]
pub struct BackupConfiguration {
    pub id: String,
    pub source_dir: PathBuf,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_host: String,
    pub db_port: u16,
    pub include_db: bool,
    pub max_backups: usize,
}

pub struct ConfigRegistry {
    order: Vec<String>,
    sections: HashMap<String, HashMap<String, String>>,
}

impl ConfigRegistry {
    /// Load the registry file
    pub fn load<P: AsRef<Path>>(registry_file: P) -> Result<Self> {
        let registry_file = registry_file.as_ref();

        if !registry_file.exists() {
            return Err(anyhow!(
                "registry file not found at {}",
                registry_file.display()
            ));
        }

        let content = fs::read_to_string(registry_file)
            .context("Failed to read registry file")?;

        let mut order = Vec::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let id = line[1..line.len() - 1].trim().to_string();
                if !sections.contains_key(&id) {
                    order.push(id.clone());
                    sections.insert(id.clone(), HashMap::new());
                }
                current = Some(id);
                continue;
            }

            if let (Some(id), Some((key, value))) = (&current, line.split_once('=')) {
                if let Some(section) = sections.get_mut(id) {
                    section.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }

        Ok(Self { order, sections })
    }

    /// Configuration IDs in registry file order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Resolve one configuration, validating every required field
    pub fn get(&self, id: &str) -> Result<BackupConfiguration, BackupError> {
        let section = self
            .sections
            .get(id)
            .ok_or_else(|| BackupError::ConfigNotFound(id.to_string()))?;

        let field = |key: &'static str| -> Result<&str, BackupError> {
            section
                .get(key)
                .map(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| BackupError::ConfigFieldMissing {
                    id: id.to_string(),
                    field: key,
                })
        };
        let malformed = |key: &'static str| BackupError::ConfigFieldMissing {
            id: id.to_string(),
            field: key,
        };

        let db_port: u16 = field("DB_PORT")?
            .parse()
            .map_err(|_| malformed("DB_PORT"))?;

        let include_db =
            parse_flag(field("INCLUDE_DB")?).ok_or_else(|| malformed("INCLUDE_DB"))?;

        // Retention limit must be a positive integer
        let max_backups: usize = field("MAX_BACKUPS")?
            .parse()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| malformed("MAX_BACKUPS"))?;

        Ok(BackupConfiguration {
            id: id.to_string(),
            source_dir: PathBuf::from(field("WP_DIR")?),
            db_name: field("DB_NAME")?.to_string(),
            db_user: field("DB_USER")?.to_string(),
            db_password: field("DB_PASSWORD")?.to_string(),
            db_host: field("DB_HOST")?.to_string(),
            db_port,
            include_db,
            max_backups,
        })
    }
}

/// Accepted true/false tokens for INCLUDE_DB
fn parse_flag(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
