//! Alpha Vantage credential loading.
//!
//! The rotation file is JSON in one of two shapes: a flat list of key
//! strings, or a mapping with an `"Alpha Vantage"` entry holding objects
//! that each carry an `"ALPHA_VANTAGE_API_KEY"` field. Keys are
//! de-duplicated preserving first-seen order; empty strings are dropped.

use crate::config::ApiKeyInfo;
use crate::error::DataError;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Resolve the Alpha Vantage key rotation list from configuration.
///
/// A configured rotation file takes precedence when it exists on disk;
/// otherwise the single inline key is used. No keys at all is not an error
/// here — the orchestrator reports exhaustion when it tries to rotate.
pub fn load_alpha_vantage_keys(info: &ApiKeyInfo) -> Result<Vec<String>, DataError> {
    if let Some(path) = &info.api_key_file_path {
        if path.exists() {
            let keys = read_key_file(path)?;
            info!(count = keys.len(), file = %path.display(), "loaded API key rotation file");
            return Ok(keys);
        }
        warn!(file = %path.display(), "API key file not found, falling back to inline key");
    }

    match info.api_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(vec![key.to_string()]),
        _ => {
            warn!("no Alpha Vantage API key configured");
            Ok(Vec::new())
        }
    }
}

fn read_key_file(path: &Path) -> Result<Vec<String>, DataError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DataError::Config(format!("cannot read key file {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| DataError::Config(format!("invalid key file {}: {e}", path.display())))?;

    let raw: Vec<String> = match &value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::Object(map) => match map.get("Alpha Vantage") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| entry.get("ALPHA_VANTAGE_API_KEY"))
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => {
                return Err(DataError::Config(format!(
                    "key file {} has no \"Alpha Vantage\" list",
                    path.display()
                )))
            }
        },
        _ => {
            return Err(DataError::Config(format!(
                "key file {} must be a JSON list or mapping",
                path.display()
            )))
        }
    };

    let mut keys = Vec::new();
    for key in raw {
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}
