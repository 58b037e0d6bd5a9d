/// Scheduled backups via the user crontab
///
/// One managed line per configuration ID, tagged with a marker comment
/// so install/remove can find their own entries without touching the
/// rest of the crontab.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

use crate::utils::CRONTAB_TOOL;

const CRON_MARKER: &str = "# wpvault:";

#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    Daily { hour: u8 },
    Weekly { day: u8, hour: u8 },
    Custom { cron: String },
}

impl Schedule {
    pub fn cron_expression(&self) -> String {
        match self {
            Schedule::Daily { hour } => format!("0 {} * * *", hour),
            Schedule::Weekly { day, hour } => format!("0 {} * * {}", hour, day),
            Schedule::Custom { cron } => cron.clone(),
        }
    }
}

pub struct CronScheduler;

impl CronScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Install or replace the crontab entry for one configuration
    pub fn install(&self, config_id: &str, schedule: &Schedule) -> Result<String> {
        let binary = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "wpvault".to_string());

        let line = format!(
            "{} {} backup {} {}{}",
            schedule.cron_expression(),
            binary,
            config_id,
            CRON_MARKER,
            config_id
        );

        let current = self.read_crontab()?;
        let updated = upsert_entry(&current, config_id, &line);
        self.write_crontab(&updated)?;

        Ok(line)
    }

    /// Remove the crontab entry for one configuration
    pub fn remove(&self, config_id: &str) -> Result<bool> {
        let current = self.read_crontab()?;
        let updated = remove_entry(&current, config_id);
        let removed = updated != current;
        if removed {
            self.write_crontab(&updated)?;
        }
        Ok(removed)
    }

    fn read_crontab(&self) -> Result<String> {
        let output = Command::new(CRONTAB_TOOL)
            .arg("-l")
            .output()
            .context("Failed to run crontab")?;

        // A user with no crontab yet is not an error
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Ok(String::new())
        }
    }

    fn write_crontab(&self, content: &str) -> Result<()> {
        let mut child = Command::new(CRONTAB_TOOL)
            .arg("-")
            .stdin(Stdio::piped())
            .spawn()
            .context("Failed to run crontab")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            bail!("crontab rejected the new table (exit {})", status);
        }

        Ok(())
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace this configuration's managed line, or append it
fn upsert_entry(crontab: &str, config_id: &str, line: &str) -> String {
    let mut lines: Vec<&str> = crontab
        .lines()
        .filter(|l| !is_managed_line(l, config_id))
        .collect();
    lines.push(line);
    let mut result = lines.join("\n");
    result.push('\n');
    result
}

/// Strip this configuration's managed line, leaving everything else alone
fn remove_entry(crontab: &str, config_id: &str) -> String {
    let lines: Vec<&str> = crontab
        .lines()
        .filter(|l| !is_managed_line(l, config_id))
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        let mut result = lines.join("\n");
        result.push('\n');
        result
    }
}

fn is_managed_line(line: &str, config_id: &str) -> bool {
    line.trim_end()
        .ends_with(&format!("{}{}", CRON_MARKER, config_id))
}
