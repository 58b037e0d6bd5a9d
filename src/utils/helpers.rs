/// Helper utilities for wpvault

use chrono::Local;
use regex::Regex;
use std::sync::OnceLock;

use crate::utils::constants::SNAPSHOT_TIMESTAMP_FORMAT;

/// Current local time rendered as a snapshot directory name
pub fn snapshot_timestamp() -> String {
    Local::now().format(SNAPSHOT_TIMESTAMP_FORMAT).to_string()
}

/// Whether a directory name is a snapshot timestamp (YYYYMMDD_HHMMSS).
/// Anything else under a site's backup directory is not ours to touch.
pub fn is_snapshot_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^\d{8}_\d{6}$").expect("snapshot name pattern is valid")
    });
    pattern.is_match(name)
}

/// Last `max_lines` non-empty lines of a child's captured stderr
pub fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
