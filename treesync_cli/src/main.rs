mod report;
mod sync;

use anyhow::{Context, Result};
use clap::Parser;
use report::{InfoReporter, ReportFormatter, Summary};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use sync::SyncReporter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use treesync_common::{load_config, save_config, AppConfig, EqualityLevel, TreeSyncError};
use treesync_core::{
    CancelFlag, ChangeEvent, ChangeReporter, EventLog, FileOperations, TreeComparator,
};

#[derive(Parser)]
#[command(name = "treesync")]
#[command(author = "Treesync Contributors")]
#[command(version)]
#[command(about = "Compare two directory trees and resolve their differences", long_about = None)]
struct Cli {
    /// First directory
    #[arg(required_unless_present = "write_config")]
    path1: Option<PathBuf>,

    /// Second directory
    #[arg(required_unless_present = "write_config")]
    path2: Option<PathBuf>,

    /// Print every compared pair and file details
    #[arg(short, long)]
    verbose: bool,

    /// Only report differences, never modify anything
    #[arg(short, long)]
    info: bool,

    /// Copy the first file's modification time onto the second when contents match
    #[arg(long)]
    fix_last_modified: bool,

    /// Path relative to both roots to skip (can be specified multiple times)
    #[arg(short, long = "exclude", value_name = "PATH")]
    exclude: Vec<PathBuf>,

    /// Equality level: SIZE, LAST_MODIFIED or CONTENT
    #[arg(short, long)]
    level: Option<EqualityLevel>,

    /// Output the report as JSON (requires --info)
    #[arg(long, requires = "info")]
    json: bool,

    /// Show what would be copied or deleted without doing it
    #[arg(long, conflicts_with = "info")]
    dry_run: bool,

    /// Move deleted entries to the trash instead of removing them
    #[arg(long, conflicts_with = "info")]
    trash: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save the effective configuration and exit
    #[arg(long)]
    write_config: bool,
}

/// Settings after merging the configuration file with the command line
struct Settings {
    config: AppConfig,
    path1: PathBuf,
    path2: PathBuf,
}

#[derive(Serialize)]
struct JsonReport {
    path1: String,
    path2: String,
    level: EqualityLevel,
    summary: JsonSummary,
    events: Vec<ChangeEvent>,
}

#[derive(Serialize)]
struct JsonSummary {
    compared: usize,
    missing: usize,
    different: usize,
    errors: usize,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the report on stdout stays clean
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let loaded = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if loaded.exists {
        info!("Loaded configuration from {}", loaded.path.display());
    }
    let config = merge_config(loaded.config, &cli);

    if cli.write_config {
        save_config(&loaded.path, &config).context("Failed to save configuration")?;
        println!("Configuration written to {}", loaded.path.display());
        return Ok(0);
    }

    let (Some(path1), Some(path2)) = (cli.path1.clone(), cli.path2.clone()) else {
        anyhow::bail!("PATH1 and PATH2 are required");
    };
    let settings = Settings {
        config,
        path1,
        path2,
    };

    if cli.info && cli.json {
        run_json(&settings)
    } else if cli.info {
        run_info(&settings)
    } else {
        run_sync(&settings, cli.dry_run)
    }
}

/// Command-line flags win over the file; exclusions from both are kept.
fn merge_config(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(level) = cli.level {
        config.level = level;
    }
    config.fix_last_modified |= cli.fix_last_modified;
    config.verbose |= cli.verbose;
    config.use_trash |= cli.trash;
    for exclusion in &cli.exclude {
        if !config.exclusions.contains(exclusion) {
            config.exclusions.push(exclusion.clone());
        }
    }
    config
}

fn build_comparator<R: ChangeReporter>(
    reporter: R,
    settings: &Settings,
    cancel: CancelFlag,
) -> Result<TreeComparator<R>> {
    let mut comparator = TreeComparator::new(
        reporter,
        &settings.path1,
        &settings.path2,
        &settings.config.exclusions,
    )
    .context("Invalid arguments")?
    .with_cancel_flag(cancel);
    comparator.set_level(settings.config.level);
    comparator.set_fix_last_modified(settings.config.fix_last_modified);
    Ok(comparator)
}

/// Runs the walk; `Ok(false)` means the user stopped it.
fn search<R: ChangeReporter>(comparator: &mut TreeComparator<R>) -> Result<bool> {
    match comparator.search() {
        Ok(()) => Ok(true),
        Err(e) if e.is_cancelled() => Ok(false),
        Err(e) => Err(e).context("Comparison failed"),
    }
}

/// 0 when the trees matched, 2 when differences were reported, 1 when stopped
fn exit_status(completed: bool, summary: Summary) -> i32 {
    if !completed {
        1
    } else if summary.has_differences() {
        2
    } else {
        0
    }
}

fn finish(completed: bool, summary: Summary) -> i32 {
    if !completed {
        println!("Stopped by the user");
    }
    exit_status(completed, summary)
}

fn formatter(settings: &Settings) -> ReportFormatter {
    ReportFormatter::new(&settings.path1, &settings.path2)
}

fn run_info(settings: &Settings) -> Result<i32> {
    let reporter = InfoReporter::new(formatter(settings), settings.config.verbose, io::stdout());
    let mut comparator = build_comparator(reporter, settings, CancelFlag::new())?;
    let completed = search(&mut comparator)?;
    Ok(finish(completed, comparator.reporter().summary()))
}

fn run_sync(settings: &Settings, dry_run: bool) -> Result<i32> {
    let cancel = CancelFlag::new();
    let operations = FileOperations::new(dry_run, settings.config.use_trash);
    let reporter = SyncReporter::new(
        formatter(settings),
        settings.config.verbose,
        io::stdin().lock(),
        io::stdout(),
        operations,
        cancel.clone(),
    );
    let mut comparator = build_comparator(reporter, settings, cancel)?;
    let completed = search(&mut comparator)?;
    Ok(finish(completed, comparator.reporter().summary()))
}

fn run_json(settings: &Settings) -> Result<i32> {
    let mut comparator = build_comparator(EventLog::new(), settings, CancelFlag::new())?;
    search(&mut comparator)?;
    let log = comparator.into_reporter();

    let summary = Summary {
        compared: log.comparing_count(),
        missing: log.missing_count(),
        different: log.different_count(),
        errors: log.error_count(),
    };
    let report = build_json_report(settings, summary, log.into_events());
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| TreeSyncError::Serialization(e.to_string()))?;
    println!("{}", json);

    Ok(finish(true, summary))
}

fn build_json_report(settings: &Settings, summary: Summary, events: Vec<ChangeEvent>) -> JsonReport {
    JsonReport {
        path1: display(&settings.path1),
        path2: display(&settings.path2),
        level: settings.config.level,
        summary: JsonSummary {
            compared: summary.compared,
            missing: summary.missing,
            different: summary.different,
            errors: summary.errors,
        },
        events,
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
