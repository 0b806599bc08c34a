mod config;
mod db;
mod job;
mod logfile;
mod project;
mod report;
mod run_date;
mod secret;
mod sync;
mod traffic;
mod web;

use clap::Parser;
use report::ReportFormat;
use run_date::RunDate;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tally a day's mirror bandwidth per project from web-access and
/// sync-daemon logs, print a summary, and optionally store it.
#[derive(Parser, Debug)]
#[command(name = "mirrorstats", version, about)]
pub struct Cli {
    /// Day to tally, YYYY-MM-DD (default: yesterday)
    #[arg(value_name = "DATE")]
    date: Option<String>,

    /// Config file path
    #[arg(short, long, default_value = "mirrorstats.toml")]
    config: PathBuf,

    /// Write rows to the statistics database (default is a dry run)
    #[arg(long)]
    commit: bool,

    /// Don't print the report
    #[arg(short, long)]
    quiet: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Storage root whose subdirectories are the projects (overrides config)
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Web-access log to read, repeatable (replaces configured logs and their rotations)
    #[arg(long = "web-log", value_name = "PATH")]
    web_logs: Vec<PathBuf>,

    /// Sync-daemon log to read, repeatable (replaces sync log discovery)
    #[arg(long = "sync-log", value_name = "PATH")]
    sync_logs: Vec<PathBuf>,

    /// Statistics database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Debug logging (per-line diagnostics)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let date = match cli.date.as_deref() {
        Some(s) => RunDate::parse(s)?,
        None => RunDate::yesterday(),
    };

    let cfg = config::load_config(&cli.config)?;
    let settings = cfg.resolve(config::Overrides {
        storage_root: cli.storage_root,
        web_logs: cli.web_logs,
        sync_logs: cli.sync_logs,
        db: cli.db,
    });

    let opts = job::JobOptions {
        date,
        commit: cli.commit,
        report: (!cli.quiet).then_some(cli.format),
    };

    let outcome = job::run(&settings, &opts, &mut std::io::stdout().lock())?;
    let total = outcome.table.total();
    tracing::info!(
        projects = outcome.table.len(),
        up = total.up,
        down = total.down,
        web_malformed = outcome.web.malformed,
        sync_malformed = outcome.sync.malformed,
        rows = ?outcome.rows_written,
        "mirror traffic run finished"
    );
    Ok(())
}
