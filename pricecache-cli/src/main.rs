//! pricecache CLI — refresh cached prices and rebuild return series.
//!
//! With no subcommand, runs the pipeline once:
//! - fetch full history on first run, read the cache otherwise
//! - fetch and merge missing dates when the cache is stale
//! - rewrite daily and weekly return snapshots
//!
//! `status` prints the metadata sidecars of the cached snapshots.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricecache_core::data::store::SnapshotMeta;
use pricecache_core::{Config, ParquetStore, PipelineConfig, Snapshot, YahooProvider};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricecache",
    about = "pricecache — cached adjusted-close prices and return series"
)]
struct Cli {
    /// TOML settings file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory from the settings.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once (the default).
    Run,
    /// Report row counts and date ranges of the cached snapshots.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.data_dir)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(settings),
        Commands::Status => run_status(&settings.data_dir),
    }
}

fn load_settings(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut settings = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    Ok(settings)
}

fn run_pipeline(settings: PipelineConfig) -> Result<()> {
    let portfolio = settings.portfolio_file.clone();
    let config = Config::load(settings)
        .with_context(|| format!("reading tickers from {}", portfolio.display()))?;
    info!(tickers = config.tickers.len(), "loaded ticker list");

    let provider =
        YahooProvider::new(&config.settings.provider).context("building Yahoo provider")?;
    let now = chrono::Local::now().naive_local();

    let report = pricecache_core::run(&config, &provider, now).context("pipeline run failed")?;

    info!(
        initial_load = report.initial_load,
        updated = report.updated,
        fetched_rows = report.fetched_rows,
        price_rows = report.price_rows,
        latest_price = %report.latest_price_date,
        "run complete"
    );
    Ok(())
}

fn run_status(data_dir: &Path) -> Result<()> {
    let store = ParquetStore::new(data_dir);
    if !store.data_dir().exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    println!("Data directory: {}", data_dir.display());
    println!();
    println!(
        "{:<16} {:<25} {:>8} {:>8}  {:<20}",
        "Snapshot", "Date Range", "Rows", "Tickers", "Written"
    );
    println!("{}", "-".repeat(82));
    for snapshot in Snapshot::ALL {
        match store.read_meta(snapshot) {
            Some(meta) => print_meta_row(&meta),
            None if store.exists(snapshot) => {
                println!("{:<16} (no meta)", snapshot.stem());
            }
            None => println!("{:<16} (missing)", snapshot.stem()),
        }
    }

    Ok(())
}

fn print_meta_row(meta: &SnapshotMeta) {
    let range = match (meta.start_date, meta.end_date) {
        (Some(start), Some(end)) => format!("{start} to {end}"),
        _ => "(empty)".to_string(),
    };
    println!(
        "{:<16} {:<25} {:>8} {:>8}  {:<20}",
        meta.snapshot,
        range,
        meta.row_count,
        meta.tickers.len(),
        meta.written_at.format("%Y-%m-%d %H:%M:%S")
    );
}
