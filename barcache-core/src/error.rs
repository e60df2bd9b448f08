//! Structured error types for the retrieval core.
//!
//! One enum covers the whole data layer so every component speaks the same
//! error language. The orchestrator is the only place where errors are
//! downgraded (key rotation, corrupt-cache-as-miss); everything below it
//! propagates.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the data layer: request validation, providers, and the cache.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid date range {start}..{end}: {reason}")]
    InvalidDateRange {
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    #[error("unknown data driver '{name}'")]
    UnknownDriver { name: String },

    #[error("unexpected provider response: {0}")]
    ProviderResponse(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("corrupt cache entry {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("cache write failed for {path}: {reason}")]
    CacheWrite { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}
