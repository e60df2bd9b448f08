//! Retrieval orchestrator.
//!
//! Given `(ticker, start, end)`, decides cache hit vs. miss, selects the
//! configured provider driver, rotates Alpha Vantage credentials, persists
//! fetched data, and returns the canonical series.
//!
//! Outcomes are three-way: `Ok` with a populated series, `Ok` with an
//! empty series (the provider answered and there is genuinely nothing in
//! the window), or a typed `DataError`. Only request-validation and
//! configuration problems fail the call; per-key provider failures are
//! logged and rotated past, and a corrupt cache entry degrades to a miss.

use crate::bar::Series;
use crate::cache::CsvCache;
use crate::config::DataSourceConfig;
use crate::credentials::load_alpha_vantage_keys;
use crate::error::DataError;
use crate::provider::{DriverKind, HttpProviderFactory, ProviderFactory};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

pub struct Retriever {
    config: DataSourceConfig,
    cache: CsvCache,
    api_keys: Vec<String>,
    factory: Box<dyn ProviderFactory>,
    // One lock per ticker serializes the miss path (fetch + write), so
    // concurrent callers cause at most one in-flight provider fetch per
    // ticker and cannot race on the cache file. Hits stay lock-free.
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Retriever {
    /// Build a retriever with real HTTP providers.
    pub fn new(config: DataSourceConfig) -> Result<Self, DataError> {
        let api_keys = load_alpha_vantage_keys(&config.alpha_vantage_api_key_info)?;
        Ok(Self::with_factory(
            config,
            api_keys,
            Box::new(HttpProviderFactory),
        ))
    }

    /// Build a retriever with an injected provider factory. This is the
    /// seam tests use to count and script provider calls.
    pub fn with_factory(
        config: DataSourceConfig,
        api_keys: Vec<String>,
        factory: Box<dyn ProviderFactory>,
    ) -> Self {
        let cache = CsvCache::from_config(&config.data_cache);
        Self {
            config,
            cache,
            api_keys,
            factory,
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Retrieve daily bars for an explicit `[start, end]` window.
    pub fn get(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Series, DataError> {
        let today = chrono::Local::now().date_naive();
        validate_range(start, end, today)?;
        info!(ticker, %start, %end, "retrieving stock data");
        self.get_validated(ticker, start, end, false)
    }

    /// Retrieve daily bars for the configured default lookback window:
    /// Jan 1 of `years` ago through today. Cache freshness (the
    /// `expiration_days` policy) applies only on this path.
    pub fn get_default(&self, ticker: &str) -> Result<Series, DataError> {
        let today = chrono::Local::now().date_naive();
        let (start, end) = default_window(self.config.years, today);
        info!(ticker, %start, %end, "retrieving stock data (default window)");
        self.get_validated(ticker, start, end, true)
    }

    fn get_validated(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        check_freshness: bool,
    ) -> Result<Series, DataError> {
        if self.config.cache_first() {
            if let Some(series) = self.try_cache(ticker, start, end, check_freshness) {
                return Ok(series);
            }
            info!(ticker, "no usable cache entry, falling back to provider");
        }

        let lock = self.ticker_lock(ticker);
        let _guard = lock.lock().unwrap();

        // Another caller may have fetched and persisted while we waited.
        if self.config.cache_first() {
            if let Some(series) = self.try_cache(ticker, start, end, check_freshness) {
                return Ok(series);
            }
        }

        let driver: DriverKind = self.config.data_driver.parse().map_err(|e: DataError| {
            error!(
                configured = %self.config.data_driver,
                supported = ?self.config.data_drivers,
                "{e}"
            );
            e
        })?;

        match driver {
            DriverKind::AlphaVantage => self.fetch_alpha_vantage(ticker, start, end),
            DriverKind::YahooFinance => self.fetch_yahoo(ticker, start, end),
        }
    }

    /// Cache lookup: covering entry, optionally fresh, readable, non-empty.
    /// Any failure along the way is a miss, not an error.
    fn try_cache(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        check_freshness: bool,
    ) -> Option<Series> {
        let expiration = self.config.data_cache.expiration_days;
        for entry in self.cache.covering_entries(ticker, start, end) {
            if check_freshness && !self.cache.is_fresh(&entry, expiration) {
                info!(file = %entry.path.display(), "cache entry expired, ignoring");
                continue;
            }
            match self.cache.read(&entry) {
                Ok(series) if !series.is_empty() => {
                    info!(file = %entry.path.display(), "cache hit");
                    return Some(series.slice(start, end));
                }
                Ok(_) => {
                    // Missing-on-read or zero rows: same as no entry.
                    continue;
                }
                Err(e) => {
                    warn!(file = %entry.path.display(), error = %e, "corrupt cache entry, treating as miss");
                    continue;
                }
            }
        }
        None
    }

    /// Full-history-then-slice path with key rotation. Each key gets a
    /// fresh adapter instance; per-key failures rotate, exhaustion surfaces
    /// the last error.
    fn fetch_alpha_vantage(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Series, DataError> {
        if self.api_keys.is_empty() {
            return Err(DataError::Config(
                "no Alpha Vantage API keys configured".into(),
            ));
        }

        let mut last_err = None;
        for key in &self.api_keys {
            let tail = key_tail(key);
            info!(ticker, key = tail, "trying Alpha Vantage key");
            let provider = self.factory.make(DriverKind::AlphaVantage, Some(key));
            match provider.fetch_full_history(ticker) {
                Ok(full) if full.is_empty() => {
                    info!(ticker, "provider returned no data");
                    return Ok(Series::empty());
                }
                Ok(full) => {
                    self.persist(ticker, &full, start, end);
                    return Ok(full.slice(start, end));
                }
                Err(e) => {
                    warn!(ticker, key = tail, error = %e, "key failed, rotating");
                    last_err = Some(e);
                }
            }
        }

        error!(ticker, "all Alpha Vantage keys exhausted");
        Err(last_err.expect("rotation loop ran at least once"))
    }

    /// Direct ranged fetch path.
    fn fetch_yahoo(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Series, DataError> {
        let provider = self.factory.make(DriverKind::YahooFinance, None);
        let series = provider.fetch(ticker, start, end)?;
        if series.is_empty() {
            info!(ticker, "provider returned no data");
            return Ok(series);
        }
        self.persist(ticker, &series, start, end);
        Ok(series.slice(start, end))
    }

    /// Persist a fetched series. The declared coverage is widened to the
    /// requested window so a repeat of the same request registers as a
    /// hit even when its boundaries fall on non-trading days. Persistence
    /// failure is logged and never fails the retrieval.
    fn persist(&self, ticker: &str, series: &Series, start: NaiveDate, end: NaiveDate) {
        if !self.config.data_cache.enabled {
            return;
        }
        let (data_start, data_end) = match series.coverage() {
            Some(bounds) => bounds,
            None => return,
        };
        let coverage_start = data_start.min(start);
        let coverage_end = data_end.max(end);
        if let Err(e) = self
            .cache
            .write_with_coverage(ticker, series, coverage_start, coverage_end)
        {
            warn!(ticker, error = %e, "failed to persist fetched data");
        }
    }

    fn ticker_lock(&self, ticker: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fetch_locks.lock().unwrap();
        locks
            .entry(ticker.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Reject illogical or future-dated requests before any I/O happens.
fn validate_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), DataError> {
    if start >= end {
        return Err(DataError::InvalidDateRange {
            start,
            end,
            reason: "start must precede end".into(),
        });
    }
    if end > today {
        return Err(DataError::InvalidDateRange {
            start,
            end,
            reason: format!("end is after today ({today})"),
        });
    }
    Ok(())
}

/// Default lookback window: Jan 1 of `years` before today's year, through
/// today.
fn default_window(years: u32, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(today.year() - years as i32, 1, 1)
        .expect("Jan 1 is always a valid date");
    (start, today)
}

fn key_tail(key: &str) -> &str {
    let cut = key.len().saturating_sub(6);
    key.get(cut..).unwrap_or(key)
}
