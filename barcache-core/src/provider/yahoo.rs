//! Yahoo Finance adapter.
//!
//! Fetches daily OHLCV bars from the v8 chart API. Yahoo has no official
//! API and the response shape changes without notice, so the parser
//! validates structure aggressively and fails the whole call on anything
//! unexpected.
//!
//! Rows where every quote field is null are non-trading days and are
//! skipped; a row with only some fields null is malformed data and fails
//! the call — the canonical schema has no partial rows.

use super::Provider;
use crate::bar::{Bar, Series};
use crate::error::DataError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    fn full_history_url(ticker: &str) -> String {
        format!("https://query2.finance.yahoo.com/v8/finance/chart/{ticker}?range=max&interval=1d")
    }

    fn request(&self, url: &str) -> Result<ChartResponse, DataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Network(format!("HTTP {status}")));
        }

        resp.json()
            .map_err(|e| DataError::ProviderResponse(format!("chart payload: {e}")))
    }

    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Series, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                DataError::ProviderResponse(format!("{}: {}", err.code, err.description))
            } else {
                DataError::ProviderResponse("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ProviderResponse("result array is empty".into()))?;

        // A valid response for a symbol with no bars in the window carries
        // no timestamp array at all.
        let Some(timestamps) = data.timestamp else {
            return Ok(Series::empty());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ProviderResponse("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| DataError::ProviderResponse(format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holiday / non-trading rows come back entirely null.
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let (Some(open), Some(high), Some(low), Some(close), Some(volume)) =
                (open, high, low, close, volume)
            else {
                return Err(DataError::ProviderResponse(format!(
                    "partial row for {ticker} at {date}"
                )));
            };

            bars.push(Bar {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        Series::new(bars).map_err(|e| DataError::ProviderResponse(e.to_string()))
    }
}

impl Provider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo_finance"
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Series, DataError> {
        info!(ticker, %start, %end, "yahoo ranged fetch");
        let resp = self.request(&Self::chart_url(ticker, start, end))?;
        let series = Self::parse_response(ticker, resp)?;
        info!(ticker, rows = series.len(), "yahoo fetch complete");
        Ok(series)
    }

    fn fetch_full_history(&self, ticker: &str) -> Result<Series, DataError> {
        info!(ticker, "yahoo full-history fetch");
        let resp = self.request(&Self::full_history_url(ticker))?;
        let series = Self::parse_response(ticker, resp)?;
        info!(ticker, rows = series.len(), "yahoo fetch complete");
        Ok(series)
    }
}
