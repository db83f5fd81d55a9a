//! Collector configuration.
//!
//! Everything the orchestrator needs is passed in explicitly through this
//! struct; the core types never read ambient configuration themselves. The
//! Tiingo API key may come from the config file or fall back to the
//! `TIINGO_API_KEY` environment variable.

use super::provider::DataError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "TIINGO_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Root directory of the EOD store.
    pub data_dir: PathBuf,

    /// Tiingo API key. Falls back to `TIINGO_API_KEY` when absent.
    pub api_key: Option<String>,

    /// Delay between consecutive gap fetches, in milliseconds.
    pub request_delay_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            api_key: None,
            request_delay_ms: 500,
        }
    }
}

impl CollectorConfig {
    /// Load from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Other(format!("config read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| DataError::Other(format!("config parse {}: {e}", path.display())))
    }

    /// The API key to use, or a clear error naming both sources.
    pub fn resolve_api_key(&self) -> Result<String, DataError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| {
                DataError::AuthenticationRejected(format!(
                    "no Tiingo API key: set api_key in the config file or export {API_KEY_ENV}"
                ))
            })
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.request_delay_ms, 500);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let config: CollectorConfig =
            toml::from_str("data_dir = \"/var/lib/gapless\"\napi_key = \"t0k3n\"\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/gapless"));
        assert_eq!(config.api_key.as_deref(), Some("t0k3n"));
        assert_eq!(config.request_delay_ms, 500);
    }

    #[test]
    fn explicit_api_key_wins() {
        let config = CollectorConfig {
            api_key: Some("explicit".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().unwrap(), "explicit");
    }
}
