mod cli;
mod core;
mod utils;

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use cli::{Cli, Commands};
use crate::core::setup::InstallOutcome;
use crate::core::{
    BackupOrchestrator, BackupRunResult, ConfigRegistry, CronScheduler, RunHistory, RunRecord,
    Schedule,
};
use utils::{
    format_bytes, AppConfig, ARCHIVE_FILENAME, DB_DUMP_FILENAME, DEFAULT_BACKUP_ROOT,
    DEFAULT_REGISTRY_FILE,
};

/// Registry file and backup root, after flag/config/default precedence
struct Paths {
    registry: PathBuf,
    root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = resolve_paths(&cli);

    match cli.command {
        None => {
            // No command - run the interactive menu
            run_menu(&paths).await?;
        }
        Some(Commands::List) => {
            handle_list(&paths)?;
        }
        Some(Commands::Backup { config_id, json }) => {
            handle_backup(&paths, config_id, json).await?;
        }
        Some(Commands::Prune { config_id }) => {
            handle_prune(&paths, &config_id)?;
        }
        Some(Commands::History { config_id, limit }) => {
            handle_history(config_id.as_deref(), limit)?;
        }
        Some(Commands::Schedule {
            config_id,
            daily,
            weekly,
            cron,
        }) => {
            handle_schedule(&paths, &config_id, daily, weekly, cron)?;
        }
        Some(Commands::Unschedule { config_id }) => {
            handle_unschedule(&config_id)?;
        }
        Some(Commands::Install) => {
            handle_install()?;
        }
        Some(Commands::Uninstall { yes }) => {
            handle_uninstall(&paths, yes)?;
        }
    }

    Ok(())
}

fn resolve_paths(cli: &Cli) -> Paths {
    let app = AppConfig::load().unwrap_or_default();

    let registry = cli
        .registry
        .clone()
        .or_else(|| app.registry_file.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_FILE));

    let root = cli
        .root
        .clone()
        .or_else(|| app.backup_root.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_ROOT));

    Paths { registry, root }
}

async fn run_menu(paths: &Paths) -> Result<()> {
    println!("WordPress Backup Manager");
    println!("1) Install Dependencies");
    println!("2) Run Backup Now");
    println!("3) Uninstall");

    let option = prompt("Select an option: ")?;
    match option.as_str() {
        "1" => handle_install()?,
        "2" => {
            let registry = ConfigRegistry::load(&paths.registry)?;
            println!("Available configurations:");
            for id in registry.ids() {
                println!("  {}", id);
            }
            let config_id = prompt("Enter configuration ID: ")?;
            if config_id.is_empty() {
                println!("No configuration selected.");
                return Ok(());
            }
            handle_backup(paths, Some(config_id), false).await?;
        }
        "3" => handle_uninstall(paths, false)?,
        _ => println!("Invalid option selected."),
    }

    Ok(())
}

fn handle_list(paths: &Paths) -> Result<()> {
    let registry = ConfigRegistry::load(&paths.registry)?;

    if registry.ids().is_empty() {
        println!("No configurations in {}", paths.registry.display());
        return Ok(());
    }

    println!("{:<20} {:<10} {:<12} {}", "ID", "Database", "Retention", "Source");
    println!("{}", "-".repeat(70));

    for id in registry.ids() {
        match registry.get(id) {
            Ok(config) => {
                let db = if config.include_db { "yes" } else { "no" };
                println!(
                    "{:<20} {:<10} {:<12} {}",
                    id,
                    db,
                    config.max_backups,
                    config.source_dir.display()
                );
            }
            Err(e) => {
                println!("{:<20} {}", id, format!("invalid: {}", e).red());
            }
        }
    }

    Ok(())
}

async fn handle_backup(paths: &Paths, config_id: Option<String>, json: bool) -> Result<()> {
    let registry = ConfigRegistry::load(&paths.registry)?;

    let config_id = match config_id {
        Some(id) => id,
        None => {
            println!("Available configurations:");
            for id in registry.ids() {
                println!("  {}", id);
            }
            let id = prompt("Enter configuration ID: ")?;
            if id.is_empty() {
                bail!("no configuration selected");
            }
            id
        }
    };

    let orchestrator = BackupOrchestrator::new(registry, &paths.root);

    let spinner = if json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        pb.set_message(format!("Backing up {}...", config_id));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let result = orchestrator.run_backup(&config_id).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let result = result?;
    record_run(&result);

    if json {
        println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    } else {
        print_run_result(&result);
    }

    if !result.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_run_result(result: &BackupRunResult) {
    println!(
        "Backup of {} → {}\n",
        result.config_id,
        result.snapshot_path.display()
    );

    if result.db_dumped {
        let size = artifact_size(result, DB_DUMP_FILENAME);
        println!("{} Database dumped ({}, {})", "✓".green(), DB_DUMP_FILENAME, size);
    } else if let Some(e) = &result.db_error {
        println!("{} {}", "✗".red(), e.to_string().red());
    } else {
        println!("- Database backup disabled for this configuration");
    }

    if result.archived {
        let size = artifact_size(result, ARCHIVE_FILENAME);
        println!("{} Files archived ({}, {})", "✓".green(), ARCHIVE_FILENAME, size);
    } else if let Some(e) = &result.archive_error {
        println!("{} {}", "✗".red(), e.to_string().red());
    }

    if let Some(e) = &result.retention_error {
        println!("{} {}", "✗".red(), e.to_string().red());
    } else {
        println!(
            "Retention: {} kept, {} deleted",
            result.retention.kept.len(),
            result.retention.deleted.len()
        );
        for failed in &result.retention.failed {
            println!(
                "{} {}",
                "✗".red(),
                format!("could not delete {}: {}", failed.snapshot, failed.reason).red()
            );
        }
    }

    let elapsed = Duration::from_secs(result.elapsed.as_secs());
    println!("\nCompleted in {}", humantime::format_duration(elapsed));
}

fn artifact_size(result: &BackupRunResult, filename: &str) -> String {
    std::fs::metadata(result.snapshot_path.join(filename))
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string())
}

/// Best-effort history append; a failed write never fails the run
fn record_run(result: &BackupRunResult) {
    if let Ok(path) = RunHistory::default_path() {
        if let Ok(mut history) = RunHistory::load(&path) {
            history.append(RunRecord::from_result(result));
            let _ = history.save(&path);
        }
    }
}

fn handle_prune(paths: &Paths, config_id: &str) -> Result<()> {
    let registry = ConfigRegistry::load(&paths.registry)?;
    let orchestrator = BackupOrchestrator::new(registry, &paths.root);

    let report = orchestrator.prune(config_id)?;

    println!(
        "Retention for {}: {} kept, {} deleted",
        config_id,
        report.kept.len(),
        report.deleted.len()
    );
    for name in &report.deleted {
        println!("  {} deleted {}", "✓".green(), name);
    }
    for failed in &report.failed {
        println!(
            "  {} {}",
            "✗".red(),
            format!("could not delete {}: {}", failed.snapshot, failed.reason).red()
        );
    }

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn handle_history(config_id: Option<&str>, limit: usize) -> Result<()> {
    let history = RunHistory::load(RunHistory::default_path()?)?;
    let records = history.recent(config_id, limit);

    if records.is_empty() {
        println!("No recorded runs.");
        return Ok(());
    }

    println!(
        "{:<20} {:<15} {:<10} {:<17} {}",
        "Time", "Configuration", "Status", "Snapshot", "Duration"
    );
    println!("{}", "-".repeat(75));

    for record in records {
        let status = if record.is_clean() {
            "ok".green()
        } else {
            "failed".red()
        };
        let time = record
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        println!(
            "{:<20} {:<15} {:<10} {:<17} {}",
            time,
            record.config_id,
            status,
            record.snapshot,
            humantime::format_duration(Duration::from_secs(record.elapsed_secs))
        );
    }

    Ok(())
}

fn handle_schedule(
    paths: &Paths,
    config_id: &str,
    daily: Option<u8>,
    weekly: Option<String>,
    cron: Option<String>,
) -> Result<()> {
    // Fail on unknown IDs before touching the crontab
    let registry = ConfigRegistry::load(&paths.registry)?;
    registry.get(config_id)?;

    let schedule = if let Some(hour) = daily {
        if hour > 23 {
            bail!("--daily hour must be 0-23");
        }
        Schedule::Daily { hour }
    } else if let Some(value) = weekly {
        let (day, hour) = value
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("--weekly expects DAY,HOUR"))?;
        let day: u8 = day.trim().parse()?;
        let hour: u8 = hour.trim().parse()?;
        if day > 6 || hour > 23 {
            bail!("--weekly expects day 0-6 and hour 0-23");
        }
        Schedule::Weekly { day, hour }
    } else if let Some(cron) = cron {
        Schedule::Custom { cron }
    } else {
        bail!("specify --daily, --weekly, or --cron");
    };

    let line = CronScheduler::new().install(config_id, &schedule)?;
    println!("{} Scheduled: {}", "✓".green(), line);

    Ok(())
}

fn handle_unschedule(config_id: &str) -> Result<()> {
    if CronScheduler::new().remove(config_id)? {
        println!("{} Removed schedule for {}", "✓".green(), config_id);
    } else {
        println!("No schedule found for {}", config_id);
    }

    Ok(())
}

fn handle_install() -> Result<()> {
    println!("Installing required packages...");

    match crate::core::setup::install_dependencies()? {
        InstallOutcome::AlreadyPresent => {
            println!("{} Database dump client already installed", "✓".green());
        }
        InstallOutcome::Installed => {
            println!("{} Dependencies installed", "✓".green());
        }
    }

    Ok(())
}

fn handle_uninstall(paths: &Paths, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "This removes all backups and snapshots under {}.",
            paths.root.display()
        );
        let answer = prompt("Type 'yes' to confirm: ")?;
        if answer != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }

    if crate::core::setup::uninstall(&paths.root)? {
        println!("{} Removed {}", "✓".green(), paths.root.display());
    } else {
        println!("Nothing to remove at {}", paths.root.display());
    }

    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    use std::io::{self, Write};

    print!("{}", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
