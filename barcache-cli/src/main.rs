//! barcache CLI — fetch, cache management, and config inspection.
//!
//! Commands:
//! - `fetch` — retrieve daily bars for a ticker (cache-aware) and print a summary
//! - `cache status` — list cached entries with coverage and size
//! - `cache clean` — remove entries older than the expiration window
//! - `info` — print the resolved data-source configuration

use anyhow::{bail, Context, Result};
use barcache_core::{AppConfig, CsvCache, DataSourceConfig, Retriever, Series};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barcache",
    about = "Cache-aware historical stock data retrieval"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve daily bars for a ticker, from cache or the configured provider.
    Fetch {
        /// Ticker symbol (e.g., AAPL).
        ticker: String,

        /// Start date (YYYY-MM-DD). Requires --end; without both, the
        /// configured default lookback window is used.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory (ignored when --config is given). Defaults to ./data_cache.
        #[arg(long, default_value = "data_cache")]
        cache_dir: PathBuf,

        /// Override the configured provider driver.
        #[arg(long)]
        driver: Option<String>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the resolved data-source configuration.
    Info {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached entries with their declared coverage.
    Status {
        /// Cache directory. Defaults to ./data_cache.
        #[arg(long, default_value = "data_cache")]
        cache_dir: PathBuf,
    },
    /// Remove entries whose file is older than the expiration window.
    Clean {
        /// Remove entries not written in this many days.
        #[arg(long, default_value_t = 7)]
        expiration_days: u64,

        /// Cache directory. Defaults to ./data_cache.
        #[arg(long, default_value = "data_cache")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch {
            ticker,
            start,
            end,
            config,
            cache_dir,
            driver,
        } => run_fetch(ticker, start, end, config, cache_dir, driver),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clean {
                expiration_days,
                cache_dir,
                confirm,
            } => run_cache_clean(&cache_dir, expiration_days, confirm),
        },
        Commands::Info { config } => run_info(config),
    }
}

fn load_data_source(config: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<DataSourceConfig> {
    let mut ds = match config {
        Some(path) => {
            AppConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?
                .data_source
        }
        None => DataSourceConfig::default(),
    };
    // Without a config file the CLI is its own configuration: cache on,
    // directory from the flag.
    if config.is_none() {
        ds.data_cache.enabled = true;
        if let Some(dir) = cache_dir {
            ds.data_cache.cache_dir = dir;
        }
    }
    Ok(ds)
}

fn run_fetch(
    ticker: String,
    start: Option<String>,
    end: Option<String>,
    config: Option<PathBuf>,
    cache_dir: PathBuf,
    driver: Option<String>,
) -> Result<()> {
    let ticker = ticker.to_uppercase();
    let mut ds = load_data_source(config.as_deref(), Some(cache_dir))?;
    if let Some(driver) = driver {
        ds.data_driver = driver;
    }

    let retriever = Retriever::new(ds)?;
    let series = match (start, end) {
        (Some(start), Some(end)) => {
            let start = NaiveDate::parse_from_str(&start, "%Y-%m-%d")?;
            let end = NaiveDate::parse_from_str(&end, "%Y-%m-%d")?;
            retriever.get(&ticker, start, end)?
        }
        (None, None) => retriever.get_default(&ticker)?,
        _ => bail!("--start and --end must be given together"),
    };

    print_summary(&ticker, &series);
    Ok(())
}

fn print_summary(ticker: &str, series: &Series) {
    println!();
    println!("=== {ticker} ===");
    if series.is_empty() {
        println!("No data available.");
        return;
    }
    let bars = series.bars();
    let first = bars.first().unwrap();
    let last = bars.last().unwrap();
    println!("Bars:       {}", series.len());
    println!("Coverage:   {} to {}", first.date, last.date);
    println!("Last close: {:.2}", last.close);
    println!("Last volume:{:>12}", last.volume);
    println!();
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = CsvCache::new(cache_dir);
    let entries = cache.all_entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let mut total_size = 0u64;
    let mut rows: Vec<(String, String, u64)> = Vec::new();
    for entry in &entries {
        let size = std::fs::metadata(&entry.path).map(|m| m.len()).unwrap_or(0);
        total_size += size;
        rows.push((
            entry.ticker.clone(),
            format!("{} to {}", entry.start, entry.end),
            size,
        ));
    }

    println!("Cache: {}", cache_dir.display());
    println!("Entries: {}", entries.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<8} {:<25} {:>10}", "Ticker", "Coverage", "Size");
    println!("{}", "-".repeat(45));
    for (ticker, coverage, size) in &rows {
        println!("{:<8} {:<25} {:>10}", ticker, coverage, format_size(*size));
    }

    Ok(())
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

fn run_cache_clean(cache_dir: &Path, expiration_days: u64, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = CsvCache::new(cache_dir);
    let to_remove: Vec<_> = cache
        .all_entries()
        .into_iter()
        .filter(|entry| !cache.is_fresh(entry, expiration_days))
        .collect();

    if to_remove.is_empty() {
        println!("No entries older than {expiration_days} days to remove.");
        return Ok(());
    }

    println!(
        "Found {} entry(ies) older than {expiration_days} days:",
        to_remove.len()
    );
    for entry in &to_remove {
        println!("  {}", entry.path.display());
    }

    if !confirm {
        println!();
        println!("Dry run — pass --confirm to actually delete.");
        return Ok(());
    }

    for entry in &to_remove {
        std::fs::remove_file(&entry.path)
            .with_context(|| format!("removing {}", entry.path.display()))?;
        println!("Removed: {}", entry.path.display());
    }
    println!("Done. Removed {} entry(ies).", to_remove.len());

    Ok(())
}

fn run_info(config: Option<PathBuf>) -> Result<()> {
    let ds = load_data_source(config.as_deref(), None)?;
    let keys = barcache_core::load_alpha_vantage_keys(&ds.alpha_vantage_api_key_info)?;

    println!();
    println!("=== Data source configuration ===");
    println!("Priority:          {}", ds.first_data_drive);
    println!("Driver:            {}", ds.data_driver);
    println!("Available drivers: {}", ds.data_drivers.join(", "));
    println!("Default lookback:  {} years", ds.years);
    println!();
    println!("Cache enabled:     {}", ds.data_cache.enabled);
    println!("Cache directory:   {}", ds.data_cache.cache_dir.display());
    println!("File name style:   {}", ds.data_cache.file_name_style);
    println!("Expiration:        {} days", ds.data_cache.expiration_days);
    println!();
    println!("Alpha Vantage keys:{}", keys.len());
    println!();

    Ok(())
}
