//! Alpha Vantage adapter.
//!
//! Uses `TIME_SERIES_DAILY` with `outputsize=full`: the endpoint returns
//! the complete available history keyed by date string, so an explicit
//! date range is served by fetching everything once and slicing locally.
//! That full snapshot is what the orchestrator persists for reuse.
//!
//! The free tier rate-limits aggressively and signals it with a `"Note"`
//! field instead of an HTTP error; that is surfaced as a provider-response
//! error so the orchestrator rotates to the next key.

use super::Provider;
use crate::bar::{Bar, Series};
use crate::error::DataError;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const SERIES_KEY: &str = "Time Series (Daily)";

/// One day's values as Alpha Vantage spells them. The plain DAILY endpoint
/// numbers volume `5.`; the ADJUSTED endpoint numbers it `6.` — both are
/// accepted.
#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume", alias = "6. volume")]
    volume: String,
}

pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    fn parse_payload(payload: Value) -> Result<Series, DataError> {
        let Some(series_obj) = payload.get(SERIES_KEY) else {
            // The API reports problems in-band: "Error Message" for bad
            // symbols, "Note"/"Information" for rate limiting.
            let detail = ["Error Message", "Note", "Information"]
                .iter()
                .find_map(|k| payload.get(*k).and_then(Value::as_str))
                .unwrap_or("missing time series key");
            return Err(DataError::ProviderResponse(detail.to_string()));
        };

        let rows: BTreeMap<String, DailyRow> = serde_json::from_value(series_obj.clone())
            .map_err(|e| DataError::ProviderResponse(format!("time series shape: {e}")))?;

        let mut bars = Vec::with_capacity(rows.len());
        for (date_str, row) in rows {
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                DataError::ProviderResponse(format!("bad date key '{date_str}': {e}"))
            })?;
            bars.push(Bar {
                date,
                open: parse_price(&row.open, "open", date)?,
                high: parse_price(&row.high, "high", date)?,
                low: parse_price(&row.low, "low", date)?,
                close: parse_price(&row.close, "close", date)?,
                volume: row.volume.parse().map_err(|_| {
                    DataError::ProviderResponse(format!(
                        "malformed volume '{}' at {date}",
                        row.volume
                    ))
                })?,
            });
        }

        Series::new(bars).map_err(|e| DataError::ProviderResponse(e.to_string()))
    }
}

fn parse_price(raw: &str, field: &str, date: NaiveDate) -> Result<f64, DataError> {
    raw.parse().map_err(|_| {
        DataError::ProviderResponse(format!("malformed {field} '{raw}' at {date}"))
    })
}

impl Provider for AlphaVantageProvider {
    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Series, DataError> {
        Ok(self.fetch_full_history(ticker)?.slice(start, end))
    }

    fn fetch_full_history(&self, ticker: &str) -> Result<Series, DataError> {
        info!(ticker, "alpha vantage full-history fetch");
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", ticker),
                ("outputsize", "full"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Network(format!("HTTP {status}")));
        }

        let payload: Value = resp
            .json()
            .map_err(|e| DataError::ProviderResponse(format!("non-JSON payload: {e}")))?;

        let series = Self::parse_payload(payload)?;
        info!(ticker, rows = series.len(), "alpha vantage fetch complete");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_payload_parses_ascending() {
        let series = AlphaVantageProvider::parse_payload(json!({
            "Meta Data": {"2. Symbol": "AAPL"},
            "Time Series (Daily)": {
                "2020-01-03": {
                    "1. open": "74.2900", "2. high": "75.1400", "3. low": "74.1300",
                    "4. close": "74.3600", "5. volume": "146322800"
                },
                "2020-01-02": {
                    "1. open": "74.0600", "2. high": "75.1500", "3. low": "73.8000",
                    "4. close": "75.0900", "5. volume": "135480400"
                }
            }
        }))
        .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(
            series.first_date(),
            Some(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap())
        );
        assert_eq!(series.bars()[1].open, 74.29);
        assert_eq!(series.bars()[1].volume, 146_322_800);
    }

    #[test]
    fn adjusted_endpoint_volume_key_is_accepted() {
        let series = AlphaVantageProvider::parse_payload(json!({
            "Time Series (Daily)": {
                "2020-01-02": {
                    "1. open": "74.0600", "2. high": "75.1500", "3. low": "73.8000",
                    "4. close": "75.0900", "6. volume": "135480400"
                }
            }
        }))
        .unwrap();
        assert_eq!(series.bars()[0].volume, 135_480_400);
    }

    #[test]
    fn missing_series_key_reports_api_message() {
        let err = AlphaVantageProvider::parse_payload(json!({
            "Error Message": "Invalid API call for symbol NOSUCH"
        }))
        .unwrap_err();
        match err {
            DataError::ProviderResponse(msg) => assert!(msg.contains("NOSUCH")),
            other => panic!("expected ProviderResponse, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_note_is_a_provider_error() {
        let err = AlphaVantageProvider::parse_payload(json!({
            "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 25 requests per day"
        }))
        .unwrap_err();
        assert!(matches!(err, DataError::ProviderResponse(_)));
    }

    #[test]
    fn malformed_price_fails_the_whole_call() {
        let err = AlphaVantageProvider::parse_payload(json!({
            "Time Series (Daily)": {
                "2020-01-02": {
                    "1. open": "not-a-number", "2. high": "75.15", "3. low": "73.80",
                    "4. close": "75.09", "5. volume": "135480400"
                }
            }
        }))
        .unwrap_err();
        match err {
            DataError::ProviderResponse(msg) => assert!(msg.contains("open")),
            other => panic!("expected ProviderResponse, got {other:?}"),
        }
    }

    #[test]
    fn slice_after_full_history_is_inclusive() {
        let full = AlphaVantageProvider::parse_payload(json!({
            "Time Series (Daily)": {
                "2020-01-02": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "100"},
                "2020-01-03": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "100"},
                "2020-01-06": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "100"},
                "2020-01-07": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "100"}
            }
        }))
        .unwrap();

        let sliced = full.slice(
            NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
        );
        assert_eq!(sliced.len(), 2);
    }
}
