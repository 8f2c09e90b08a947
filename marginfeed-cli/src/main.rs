//! MarginFeed CLI — incremental sync and cache inspection.
//!
//! Commands:
//! - `update` — fetch missing trading days and merge them into the cached table
//! - `status` — report cache path, row count, and cached date range

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use marginfeed_core::config::SyncConfig;
use marginfeed_core::data::{CsvStore, MarginDetail, RateLimiter, TuShareClient, TushareCalendar};

#[derive(Parser)]
#[command(name = "marginfeed", about = "Incremental margin-trading detail sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch missing trading days and merge them into the cached table.
    Update {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data directory. Overrides the config file.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// API token. Overrides the config file and TUSHARE_TOKEN.
        #[arg(long)]
        token: Option<String>,
    },
    /// Report cache path, row count, and cached date range.
    Status {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data directory. Overrides the config file.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info");

    let cli = Cli::parse();
    match cli.command {
        Commands::Update {
            config,
            data_dir,
            token,
        } => run_update(config, data_dir, token),
        Commands::Status { config, data_dir } => run_status(config, data_dir),
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

fn load_config(path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<SyncConfig> {
    let mut cfg = match path {
        Some(p) => SyncConfig::from_file(&p)?,
        None => SyncConfig::default(),
    };
    if let Some(dir) = data_dir {
        cfg.data_dir = dir;
    }
    Ok(cfg)
}

fn run_update(
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    token: Option<String>,
) -> Result<()> {
    let mut cfg = load_config(config, data_dir)?;
    if let Some(t) = token {
        cfg.api.token = t;
    }
    let token = cfg.resolved_token()?;

    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
        cfg.api.min_interval_ms,
    )));
    let client = Arc::new(TuShareClient::new(cfg.api.endpoint.as_str(), token, limiter));
    let calendar = TushareCalendar::new(Arc::clone(&client));
    let mut dataset = MarginDetail::new(&cfg.data_dir);

    match dataset.update(client.as_ref(), &calendar) {
        Ok(summary) if summary.up_to_date() => {
            println!("Up to date: {}", dataset.file_path().display());
            Ok(())
        }
        Ok(summary) => {
            println!(
                "Fetched {} trading day(s), added {} row(s).",
                summary.days_fetched, summary.rows_added
            );
            if let Some(latest) = summary.latest_cached {
                println!("Cached through {latest}: {}", dataset.file_path().display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Update failed: {e}");
            eprintln!("Partial progress (if any) was persisted; rerun to resume.");
            std::process::exit(1);
        }
    }
}

fn run_status(config: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let cfg = load_config(config, data_dir)?;
    let store = CsvStore::new(&cfg.data_dir);

    if !store.exists() {
        println!("No cached table: {}", store.file_path().display());
        return Ok(());
    }

    let records = store.load()?;
    println!("Cache: {}", store.file_path().display());
    println!("Rows:  {}", records.len());
    match (records.first(), records.last()) {
        (Some(first), Some(last)) => {
            println!("Dates: {} to {}", first.trade_date, last.trade_date);
        }
        _ => println!("Dates: (empty)"),
    }
    Ok(())
}
