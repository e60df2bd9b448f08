//! Startup configuration.
//!
//! Loaded once from a TOML file before any component is constructed and
//! immutable for the process lifetime. Only the `[data_source]` table is
//! owned here; anything else in the file is ignored.

use crate::error::DataError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data_source: DataSourceConfig,
}

impl AppConfig {
    /// Load and parse the configuration file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, DataError> {
        toml::from_str(text).map_err(|e| DataError::Config(e.to_string()))
    }
}

/// The `[data_source]` table: driver selection, cache policy, credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Provider driver to use on a cache miss.
    pub data_driver: String,

    /// All drivers this build knows about (diagnostics only).
    pub data_drivers: Vec<String>,

    /// What to consult first: `"data_cache"` or a provider name.
    /// The alias accepts the misspelled key the original config shipped with.
    #[serde(alias = "frist_data_drive")]
    pub first_data_drive: String,

    /// Default lookback window in years when no explicit range is given.
    pub years: u32,

    pub data_cache: CacheConfig,

    pub alpha_vantage_api_key_info: ApiKeyInfo,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            data_driver: "yahoo_finance".into(),
            data_drivers: vec!["yahoo_finance".into(), "alpha_vantage".into()],
            first_data_drive: "data_cache".into(),
            years: 5,
            data_cache: CacheConfig::default(),
            alpha_vantage_api_key_info: ApiKeyInfo::default(),
        }
    }
}

impl DataSourceConfig {
    /// True when retrieval should try the cache before any provider.
    pub fn cache_first(&self) -> bool {
        self.first_data_drive == "data_cache" && self.data_cache.enabled
    }
}

/// The `[data_source.data_cache]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub cache_dir: PathBuf,
    /// Naming template for cache files. Supports the `{ticker}`, `{start}`
    /// and `{end}` placeholders; the three-field `_`-separated form must be
    /// kept for entries to be recognized on lookup.
    pub file_name_style: String,
    pub expiration_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_dir: PathBuf::from("data_cache"),
            file_name_style: "{ticker}_{start}_{end}.csv".into(),
            expiration_days: 7,
        }
    }
}

/// The `[data_source.alpha_vantage_api_key_info]` table: a single inline
/// key, or a path to a JSON rotation file (the file wins when both are set).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeyInfo {
    pub api_key: Option<String>,
    pub api_key_file_path: Option<PathBuf>,
}
