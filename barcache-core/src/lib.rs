//! barcache-core — cache-aware historical stock data retrieval.
//!
//! The crate is organized leaf-first:
//! - Canonical schema ([`bar`]): the normalized daily OHLCV row every
//!   component speaks.
//! - Provider adapters ([`provider`]): one per upstream source, each
//!   normalizing its wire format into the canonical schema.
//! - Cache store ([`cache`]): flat CSV files keyed by ticker and declared
//!   coverage window.
//! - Retrieval orchestrator ([`retriever`]): cache-hit vs. miss decision,
//!   driver selection, credential rotation, persistence.
//!
//! Logging goes through `tracing`; the embedding binary installs a
//! subscriber once before constructing any component.

pub mod bar;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod provider;
pub mod retriever;

pub use bar::{Bar, Series};
pub use cache::{CacheEntry, CsvCache};
pub use config::{ApiKeyInfo, AppConfig, CacheConfig, DataSourceConfig};
pub use credentials::load_alpha_vantage_keys;
pub use error::DataError;
pub use provider::{
    AlphaVantageProvider, DriverKind, HttpProviderFactory, Provider, ProviderFactory,
    YahooProvider,
};
pub use retriever::Retriever;
