//! CSV cache store.
//!
//! One file per fetched window, named `{TICKER}_{start}_{end}.csv` with the
//! coverage dates embedded in the name — the file name is the only index.
//! Entries are immutable once written: a request needing a superset of data
//! produces a new entry, and nothing is deleted automatically.
//!
//! Writes go to a `.tmp` sibling and are renamed into place, then verified
//! with an existence check so silent I/O failures surface as errors.

use crate::bar::{Bar, Series};
use crate::config::CacheConfig;
use crate::error::DataError;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const DATE_FMT: &str = "%Y-%m-%d";

/// A cache entry identified by its file name.
///
/// The declared coverage window is provenance from the fetch that created
/// the entry, not a guarantee the window is gap-free.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub path: PathBuf,
}

impl CacheEntry {
    /// Whether the declared coverage fully contains `[start, end]` (inclusive).
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= start && self.end >= end
    }

    fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Parse an entry from a cache file path. Returns `None` when the name
    /// does not follow the `{TICKER}_{start}_{end}.csv` convention.
    fn parse(path: &Path) -> Option<CacheEntry> {
        let stem = path.file_name()?.to_str()?.strip_suffix(".csv")?;
        let mut parts = stem.split('_');
        let ticker = parts.next()?;
        let start = NaiveDate::parse_from_str(parts.next()?, DATE_FMT).ok()?;
        let end = NaiveDate::parse_from_str(parts.next()?, DATE_FMT).ok()?;
        if parts.next().is_some() || ticker.is_empty() {
            return None;
        }
        Some(CacheEntry {
            ticker: ticker.to_string(),
            start,
            end,
            path: path.to_path_buf(),
        })
    }
}

/// The on-disk CSV cache.
pub struct CsvCache {
    cache_dir: PathBuf,
    name_style: String,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            name_style: CacheConfig::default().file_name_style,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            name_style: config.file_name_style.clone(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        let name = self
            .name_style
            .replace("{ticker}", ticker)
            .replace("{start}", &start.format(DATE_FMT).to_string())
            .replace("{end}", &end.format(DATE_FMT).to_string());
        self.cache_dir.join(name)
    }

    /// Every parseable entry in the cache directory, sorted by file name.
    /// A missing directory is an empty cache, not an error.
    pub fn all_entries(&self) -> Vec<CacheEntry> {
        let Ok(dir) = std::fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut entries: Vec<CacheEntry> = dir
            .flatten()
            .filter(|e| e.path().is_file())
            .filter_map(|e| CacheEntry::parse(&e.path()))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// All parseable entries for a ticker, sorted by file name.
    ///
    /// A missing cache directory is an empty cache, not an error. Files
    /// that carry the ticker prefix but don't parse are reported and
    /// skipped; unrelated files are ignored silently.
    pub fn list_entries(&self, ticker: &str) -> Vec<CacheEntry> {
        let Ok(dir) = std::fs::read_dir(&self.cache_dir) else {
            debug!(dir = %self.cache_dir.display(), "cache directory absent");
            return Vec::new();
        };

        let mut entries: Vec<CacheEntry> = Vec::new();
        for dir_entry in dir.flatten() {
            let path = dir_entry.path();
            if !path.is_file() {
                continue;
            }
            match CacheEntry::parse(&path) {
                Some(entry) if entry.ticker == ticker => entries.push(entry),
                Some(_) => {}
                None => {
                    let name = dir_entry.file_name().to_string_lossy().to_string();
                    if name.starts_with(&format!("{ticker}_")) {
                        warn!(file = %name, "unparseable cache file name, skipping");
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// All entries whose declared coverage contains `[start, end]`,
    /// tightest window first, with the file name as a deterministic
    /// tie-break.
    pub fn covering_entries(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<CacheEntry> {
        let mut covering: Vec<CacheEntry> = self
            .list_entries(ticker)
            .into_iter()
            .filter(|e| e.covers(start, end) && e.path.exists())
            .collect();
        covering.sort_by(|a, b| {
            a.span_days()
                .cmp(&b.span_days())
                .then_with(|| a.path.cmp(&b.path))
        });
        covering
    }

    /// Find the tightest entry whose declared coverage contains `[start, end]`.
    pub fn find_covering(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<CacheEntry> {
        self.covering_entries(ticker, start, end).into_iter().next()
    }

    /// Load an entry's series.
    ///
    /// A missing file yields an empty series — callers treat "missing" and
    /// "empty" identically as a cache miss. A file that exists but is
    /// empty, lacks the `date` column, or fails to parse is corrupt.
    pub fn read(&self, entry: &CacheEntry) -> Result<Series, DataError> {
        let path = &entry.path;
        if !path.exists() {
            debug!(file = %path.display(), "cache file missing, treating as empty");
            return Ok(Series::empty());
        }

        let corrupt = |reason: String| DataError::CacheCorrupt {
            path: path.clone(),
            reason,
        };

        let metadata = std::fs::metadata(path).map_err(|e| corrupt(e.to_string()))?;
        if metadata.len() == 0 {
            return Err(corrupt("empty file".into()));
        }

        let mut reader = csv::Reader::from_path(path).map_err(|e| corrupt(e.to_string()))?;
        let headers = reader.headers().map_err(|e| corrupt(e.to_string()))?;
        if !headers.iter().any(|h| h == "date") {
            return Err(corrupt("missing mandatory 'date' column".into()));
        }

        let mut bars = Vec::new();
        for row in reader.deserialize::<Bar>() {
            bars.push(row.map_err(|e| corrupt(e.to_string()))?);
        }

        let series = Series::new(bars).map_err(|e| corrupt(e.to_string()))?;
        info!(file = %path.display(), rows = series.len(), "cache read");
        Ok(series)
    }

    /// Persist a series, deriving coverage from its min/max dates.
    ///
    /// The write is only considered successful once the final path passes
    /// an existence check — a rename that silently dropped the file is a
    /// `CacheWrite` error, not a success.
    pub fn write(&self, ticker: &str, series: &Series) -> Result<CacheEntry, DataError> {
        match series.coverage() {
            Some((start, end)) => self.write_with_coverage(ticker, series, start, end),
            None => {
                warn!(ticker, "refusing to cache an empty series");
                Err(DataError::CacheWrite {
                    path: self.cache_dir.clone(),
                    reason: "empty series".into(),
                })
            }
        }
    }

    /// Persist a series under an explicitly declared coverage window.
    ///
    /// The declared window must contain the data's own min/max span —
    /// coverage is provenance of the fetch, and may be wider than the data
    /// (a request whose boundary falls on a non-trading day still counts
    /// the whole requested window as covered).
    pub fn write_with_coverage(
        &self,
        ticker: &str,
        series: &Series,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CacheEntry, DataError> {
        let Some((data_start, data_end)) = series.coverage() else {
            warn!(ticker, "refusing to cache an empty series");
            return Err(DataError::CacheWrite {
                path: self.cache_dir.clone(),
                reason: "empty series".into(),
            });
        };
        if start > data_start || end < data_end {
            return Err(DataError::CacheWrite {
                path: self.cache_dir.clone(),
                reason: format!(
                    "declared coverage {start}..{end} does not contain data span {data_start}..{data_end}"
                ),
            });
        }

        std::fs::create_dir_all(&self.cache_dir).map_err(|e| DataError::CacheWrite {
            path: self.cache_dir.clone(),
            reason: format!("cannot create cache directory: {e}"),
        })?;

        let path = self.entry_path(ticker, start, end);
        let tmp_path = path.with_extension("csv.tmp");
        let failed = |reason: String| DataError::CacheWrite {
            path: path.clone(),
            reason,
        };

        {
            let mut writer =
                csv::Writer::from_path(&tmp_path).map_err(|e| failed(e.to_string()))?;
            for bar in series {
                writer.serialize(bar).map_err(|e| failed(e.to_string()))?;
            }
            writer.flush().map_err(|e| failed(e.to_string()))?;
        }

        std::fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            failed(format!("rename failed: {e}"))
        })?;

        if !path.exists() {
            return Err(failed("post-write existence check failed".into()));
        }

        info!(file = %path.display(), rows = series.len(), "cache write");
        Ok(CacheEntry {
            ticker: ticker.to_string(),
            start,
            end,
            path,
        })
    }

    /// Whether the entry's file was modified within the expiration window.
    ///
    /// Consulted only on the default-window path; explicit-range lookups
    /// rely on coverage alone.
    pub fn is_fresh(&self, entry: &CacheEntry, expiration_days: u64) -> bool {
        let Ok(modified) = entry.path.metadata().and_then(|m| m.modified()) else {
            return false;
        };
        let Ok(age) = modified.elapsed() else {
            // Clock skew put the mtime in the future; call it fresh.
            return true;
        };
        age <= Duration::from_secs(expiration_days * 24 * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(y: i32, m: u32, d: u32, close: f64) -> Bar {
        Bar {
            date: date(y, m, d),
            open: close - 0.5,
            high: close + 1.25,
            low: close - 1.75,
            close,
            volume: 12_345,
        }
    }

    fn sample_series() -> Series {
        Series::new(vec![
            bar(2024, 1, 2, 101.5),
            bar(2024, 1, 3, 102.25),
            bar(2024, 1, 4, 100.75),
        ])
        .unwrap()
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());

        let entry = cache.write("AAPL", &sample_series()).unwrap();
        assert_eq!(entry.start, date(2024, 1, 2));
        assert_eq!(entry.end, date(2024, 1, 4));
        assert_eq!(
            entry.path.file_name().unwrap().to_str().unwrap(),
            "AAPL_2024-01-02_2024-01-04.csv"
        );

        let loaded = cache.read(&entry).unwrap();
        assert_eq!(loaded, sample_series());
    }

    #[test]
    fn date_is_the_first_column() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let entry = cache.write("AAPL", &sample_series()).unwrap();

        let text = std::fs::read_to_string(&entry.path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "date,open,high,low,close,volume");
        assert!(text.lines().nth(1).unwrap().starts_with("2024-01-02,"));
    }

    #[test]
    fn write_refuses_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let err = cache.write("AAPL", &Series::empty()).unwrap_err();
        assert!(matches!(err, DataError::CacheWrite { .. }));
        assert!(cache.list_entries("AAPL").is_empty());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let entry = CacheEntry {
            ticker: "AAPL".into(),
            start: date(2024, 1, 1),
            end: date(2024, 12, 31),
            path: dir.path().join("AAPL_2024-01-01_2024-12-31.csv"),
        };
        assert!(cache.read(&entry).unwrap().is_empty());
    }

    #[test]
    fn empty_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let path = dir.path().join("AAPL_2024-01-01_2024-12-31.csv");
        std::fs::write(&path, "").unwrap();

        let entry = CacheEntry::parse(&path).unwrap();
        assert!(matches!(
            cache.read(&entry),
            Err(DataError::CacheCorrupt { .. })
        ));
    }

    #[test]
    fn missing_date_column_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let path = dir.path().join("AAPL_2024-01-01_2024-12-31.csv");
        std::fs::write(&path, "open,high,low,close,volume\n1,2,0.5,1.5,100\n").unwrap();

        let entry = CacheEntry::parse(&path).unwrap();
        let err = cache.read(&entry).unwrap_err();
        match err {
            DataError::CacheCorrupt { reason, .. } => assert!(reason.contains("date")),
            other => panic!("expected CacheCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn list_entries_missing_dir_is_empty() {
        let cache = CsvCache::new("/nonexistent/cache/dir");
        assert!(cache.list_entries("AAPL").is_empty());
    }

    #[test]
    fn list_entries_filters_by_exact_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        cache.write("AA", &sample_series()).unwrap();
        cache.write("AAPL", &sample_series()).unwrap();

        let entries = cache.list_entries("AA");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ticker, "AA");
    }

    #[test]
    fn covering_entry_matches_contained_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        std::fs::write(
            dir.path().join("AAPL_2020-01-01_2024-12-31.csv"),
            "date,open,high,low,close,volume\n2020-06-01,1,2,0.5,1.5,100\n",
        )
        .unwrap();

        let hit = cache.find_covering("AAPL", date(2021, 6, 1), date(2022, 6, 1));
        assert!(hit.is_some());

        // A window extending past the declared coverage is a miss.
        assert!(cache
            .find_covering("AAPL", date(2019, 6, 1), date(2022, 6, 1))
            .is_none());
    }

    #[test]
    fn narrow_coverage_does_not_satisfy_wider_request() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        std::fs::write(
            dir.path().join("AAPL_2021-01-01_2021-12-31.csv"),
            "date,open,high,low,close,volume\n2021-06-01,1,2,0.5,1.5,100\n",
        )
        .unwrap();

        assert!(cache
            .find_covering("AAPL", date(2020, 6, 1), date(2022, 6, 1))
            .is_none());
    }

    #[test]
    fn tightest_covering_entry_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        for name in [
            "AAPL_2000-01-01_2025-01-01.csv",
            "AAPL_2020-01-01_2023-01-01.csv",
        ] {
            std::fs::write(
                dir.path().join(name),
                "date,open,high,low,close,volume\n2021-06-01,1,2,0.5,1.5,100\n",
            )
            .unwrap();
        }

        let hit = cache
            .find_covering("AAPL", date(2021, 1, 1), date(2022, 1, 1))
            .unwrap();
        assert_eq!(hit.start, date(2020, 1, 1));
        assert_eq!(hit.end, date(2023, 1, 1));
    }

    #[test]
    fn declared_coverage_may_be_wider_than_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let entry = cache
            .write_with_coverage("AAPL", &sample_series(), date(2024, 1, 1), date(2024, 1, 10))
            .unwrap();

        assert_eq!(
            entry.path.file_name().unwrap().to_str().unwrap(),
            "AAPL_2024-01-01_2024-01-10.csv"
        );
        // The widened window now registers as covered.
        assert!(cache
            .find_covering("AAPL", date(2024, 1, 1), date(2024, 1, 10))
            .is_some());
    }

    #[test]
    fn declared_coverage_must_contain_data_span() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let err = cache
            .write_with_coverage("AAPL", &sample_series(), date(2024, 1, 3), date(2024, 1, 10))
            .unwrap_err();
        assert!(matches!(err, DataError::CacheWrite { .. }));
    }

    #[test]
    fn freshness_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let entry = cache.write("AAPL", &sample_series()).unwrap();

        assert!(cache.is_fresh(&entry, 7));
        // Zero-day expiration makes everything stale.
        assert!(!cache.is_fresh(&entry, 0));
    }

    #[test]
    fn no_tmp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        cache.write("AAPL", &sample_series()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
