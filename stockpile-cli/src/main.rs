//! Stockpile CLI — batch market-data collection commands.
//!
//! Commands:
//! - `collect` — fetch daily history and fundamentals for a ticker universe
//! - `status` — report what the data store already holds

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use stockpile_collector::{run_batch, CollectorConfig, StdoutProgress};
use stockpile_core::{DataStore, DateRange, RequestBudget, TaskStatus, Universe, YahooClient};

#[derive(Parser)]
#[command(
    name = "stockpile",
    about = "Stockpile CLI — batch market data collection"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect daily history and fundamentals for a ticker universe.
    Collect(CollectArgs),
    /// Report the tickers, coverage, and size of the data store.
    Status {
        /// Data directory root.
        #[arg(long, default_value = "data/raw")]
        data_dir: PathBuf,
    },
}

#[derive(Args)]
struct CollectArgs {
    /// Collect the built-in ten-ticker test batch.
    #[arg(long, default_value_t = false)]
    test: bool,

    /// Comma-separated ticker list (e.g. AAPL,MSFT,NVDA).
    #[arg(long, value_delimiter = ',')]
    tickers: Vec<String>,

    /// Universe file: sector TOML or a delimited exchange listing.
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Start date (YYYY-MM-DD). Defaults to --years back from the end date.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Years of history when --start is absent.
    #[arg(long, default_value_t = 5)]
    years: u32,

    /// Collector config TOML; the flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory root.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Worker pool size.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Request budget in requests per minute.
    #[arg(long)]
    rpm: Option<u32>,

    /// Fetch attempts per ticker before giving up.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Refetch everything, ignoring the manifest.
    #[arg(long, default_value_t = false)]
    no_resume: bool,

    /// Collect price history only.
    #[arg(long, default_value_t = false)]
    no_fundamentals: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Collect(args) => run_collect(args),
        Commands::Status { data_dir } => run_status(&data_dir),
    }
}

fn run_collect(args: CollectArgs) -> Result<()> {
    let universe = resolve_universe(&args)?;
    if universe.is_empty() {
        bail!("universe is empty after symbol normalization");
    }

    let config = resolve_config(&args)?;
    let range = resolve_range(&args)?;

    let store = DataStore::open(&config.data_dir)?;
    let provider = YahooClient::new(RequestBudget::per_minute(config.requests_per_minute));
    let progress = StdoutProgress::new();

    println!("Window: {range}");
    println!("Store:  {}", store.root().display());

    // Completing the batch is success regardless of per-ticker outcomes;
    // the progress reporter prints the tallies and the manifest keeps them.
    run_batch(&provider, &store, &universe, range, &config, &progress, None)?;

    Ok(())
}

fn resolve_universe(args: &CollectArgs) -> Result<Universe> {
    let explicit = !args.tickers.is_empty();
    let chosen = [args.test, explicit, args.universe.is_some()]
        .into_iter()
        .filter(|&flag| flag)
        .count();
    if chosen != 1 {
        bail!("pick exactly one of --test, --tickers, or --universe");
    }

    match &args.universe {
        Some(path) => Ok(Universe::from_file(path)?),
        None if args.test => Ok(Universe::test_sample()),
        None => Ok(Universe::from_symbols(&args.tickers)),
    }
}

fn resolve_config(args: &CollectArgs) -> Result<CollectorConfig> {
    let mut config = match &args.config {
        Some(path) => CollectorConfig::from_file(path)?,
        None => CollectorConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(workers) = args.concurrency {
        config.concurrency = workers;
    }
    if let Some(rpm) = args.rpm {
        config.requests_per_minute = rpm;
    }
    if let Some(attempts) = args.max_attempts {
        config.max_attempts = attempts;
    }
    if args.no_resume {
        config.resume = false;
    }
    if args.no_fundamentals {
        config.fundamentals = false;
    }

    Ok(config)
}

fn resolve_range(args: &CollectArgs) -> Result<DateRange> {
    if args.start.is_none() && args.end.is_none() {
        return Ok(DateRange::trailing_years(args.years));
    }

    let end = args
        .end
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let start = args
        .start
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| end - chrono::Duration::days(365 * i64::from(args.years)));

    let range = DateRange::new(start, end);
    if !range.is_valid() {
        bail!("start date {} is after end date {}", range.start, range.end);
    }
    Ok(range)
}

fn run_status(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let store = DataStore::open(data_dir)?;
    let series = store.stored_series();
    if series.is_empty() {
        println!("Store is empty: {}", data_dir.display());
        return Ok(());
    }

    let manifest = match store.load_manifest() {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("WARNING: unreadable manifest: {e}");
            None
        }
    };

    let mut total_size = 0u64;
    let mut rows: Vec<(String, String, usize, &str, u64)> = Vec::new();
    for meta in &series {
        let fundamentals_path = store.fundamentals_path(&meta.ticker);
        let size = file_size(&store.history_path(&meta.ticker)) + file_size(&fundamentals_path);
        total_size += size;
        rows.push((
            meta.ticker.clone(),
            format!("{} to {}", meta.start_date, meta.end_date),
            meta.bar_count,
            if fundamentals_path.exists() { "yes" } else { "-" },
            size,
        ));
    }

    println!("Store: {}", data_dir.display());
    println!("Tickers: {}", series.len());
    println!("Total size: {}", format_size(total_size));
    if let Some(manifest) = &manifest {
        println!(
            "Manifest: {} success, {} failed",
            manifest.count(TaskStatus::Success),
            manifest.count(TaskStatus::Failed)
        );
        let failed = manifest.failed_tickers();
        if !failed.is_empty() {
            println!("Failed: {}", failed.join(", "));
        }
    }
    println!();
    println!(
        "{:<8} {:<25} {:>8} {:>6} {:>10}",
        "Ticker", "Date Range", "Bars", "Fund", "Size"
    );
    println!("{}", "-".repeat(61));
    for (ticker, range, bars, fundamentals, size) in &rows {
        println!(
            "{:<8} {:<25} {:>8} {:>6} {:>10}",
            ticker,
            range,
            bars,
            fundamentals,
            format_size(*size)
        );
    }

    Ok(())
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
