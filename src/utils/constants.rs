/// Fixed names and defaults for the backup pipeline

/// Default registry file, one [section] per protected site
pub const DEFAULT_REGISTRY_FILE: &str = "backup_details.cfg";

/// Default root under which per-site snapshot directories live
pub const DEFAULT_BACKUP_ROOT: &str = "/var/backups/wpvault";

/// Database dump file inside a snapshot directory
pub const DB_DUMP_FILENAME: &str = "db.sql";

/// File archive inside a snapshot directory
pub const ARCHIVE_FILENAME: &str = "files.tar.gz";

/// Snapshot directory name format. Fixed width, so lexicographic order
/// on directory names is chronological order.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// External tools
pub const DUMP_TOOL: &str = "mysqldump";
pub const ARCHIVE_TOOL: &str = "tar";
pub const CRONTAB_TOOL: &str = "crontab";

/// Upper bound on a single dump or archive child process
pub const EXTERNAL_TOOL_TIMEOUT_SECS: u64 = 3600;

/// How many run records the history file keeps
pub const HISTORY_LIMIT: usize = 200;
