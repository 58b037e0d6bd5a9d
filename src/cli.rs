/// CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "wpvault")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Registry file, one [section] per protected site
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    /// Root directory for backup storage
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured sites
    List,

    /// Run a backup now
    Backup {
        /// Configuration ID (prompted for when omitted)
        config_id: Option<String>,

        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Enforce retention without taking a new backup
    Prune {
        /// Configuration ID
        config_id: String,
    },

    /// Show recent backup runs
    History {
        /// Limit to one configuration ID
        config_id: Option<String>,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Schedule recurring backups via crontab
    Schedule {
        /// Configuration ID
        config_id: String,

        /// Run daily at this hour (0-23)
        #[arg(long, value_name = "HOUR", conflicts_with_all = ["weekly", "cron"])]
        daily: Option<u8>,

        /// Run weekly as DAY,HOUR (day 0 = Sunday)
        #[arg(long, value_name = "DAY,HOUR", conflicts_with = "cron")]
        weekly: Option<String>,

        /// Custom cron expression
        #[arg(long, value_name = "EXPR")]
        cron: Option<String>,
    },

    /// Remove a scheduled backup
    Unschedule {
        /// Configuration ID
        config_id: String,
    },

    /// Install required packages
    Install,

    /// Remove all backup storage
    Uninstall {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
