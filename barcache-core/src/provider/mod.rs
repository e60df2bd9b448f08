//! Provider adapter contract.
//!
//! The [`Provider`] trait abstracts over upstream market-data sources so
//! the orchestrator can swap drivers and tests can substitute a mock.
//! Adapters issue exactly one network request per call — no internal
//! retry or backoff; failure recovery (key rotation) lives one layer up.
//!
//! Every adapter returns a typed `Result`: a malformed upstream payload is
//! an error, an answered request with no rows is an empty series. Nothing
//! is swallowed below the orchestrator.

pub mod alpha_vantage;
pub mod yahoo;

use crate::bar::Series;
use crate::error::DataError;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

pub use alpha_vantage::AlphaVantageProvider;
pub use yahoo::YahooProvider;

/// A historical daily-bar data source.
pub trait Provider {
    /// Human-readable driver name (matches the configuration enum).
    fn name(&self) -> &'static str;

    /// Fetch daily bars for an explicit `[start, end]` window (inclusive).
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Series, DataError>;

    /// Fetch the provider's maximum available history for a ticker.
    fn fetch_full_history(&self, ticker: &str) -> Result<Series, DataError>;
}

/// The fixed set of configurable drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    YahooFinance,
    AlphaVantage,
}

impl DriverKind {
    pub const ALL: [DriverKind; 2] = [DriverKind::YahooFinance, DriverKind::AlphaVantage];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::YahooFinance => "yahoo_finance",
            DriverKind::AlphaVantage => "alpha_vantage",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yahoo_finance" => Ok(DriverKind::YahooFinance),
            "alpha_vantage" => Ok(DriverKind::AlphaVantage),
            other => Err(DataError::UnknownDriver { name: other.into() }),
        }
    }
}

/// Builds provider instances for the orchestrator.
///
/// Driver selection and credential injection go through this seam so the
/// orchestrator can be exercised without network access: tests install a
/// factory that hands out counting mocks.
pub trait ProviderFactory {
    fn make(&self, driver: DriverKind, api_key: Option<&str>) -> Box<dyn Provider>;
}

/// The production factory: real HTTP-backed adapters.
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn make(&self, driver: DriverKind, api_key: Option<&str>) -> Box<dyn Provider> {
        match driver {
            DriverKind::YahooFinance => Box::new(YahooProvider::new()),
            DriverKind::AlphaVantage => {
                Box::new(AlphaVantageProvider::new(api_key.unwrap_or_default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_names_round_trip() {
        for kind in DriverKind::ALL {
            assert_eq!(kind.as_str().parse::<DriverKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_driver_name_is_typed() {
        let err = "quandl".parse::<DriverKind>().unwrap_err();
        match err {
            DataError::UnknownDriver { name } => assert_eq!(name, "quandl"),
            other => panic!("expected UnknownDriver, got {other:?}"),
        }
    }
}
