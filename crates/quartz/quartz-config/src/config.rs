use serde::Deserialize;
use std::path::Path;

/// Settings shared by the feed and tail binaries.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct QuartzConfig {
    #[serde(default = "defaults::region_name")]
    pub region_name: String,
    #[serde(default = "defaults::region_size")]
    pub region_size: usize,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default = "defaults::symbols")]
    pub symbols: Vec<SymbolFeed>,
    /// Candles rewritten per symbol on every publish.
    #[serde(default = "defaults::candles_per_write")]
    pub candles_per_write: usize,
    #[serde(default = "defaults::publish_interval_ms")]
    pub publish_interval_ms: u64,
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SymbolFeed {
    pub symbol: String,
    #[serde(default = "defaults::interval")]
    pub interval: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    use super::SymbolFeed;

    pub fn region_name() -> String {
        "quantnexus_ohlcv".into()
    }

    pub fn region_size() -> usize {
        128 << 20
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn interval() -> String {
        "1h".into()
    }

    pub fn symbols() -> Vec<SymbolFeed> {
        vec![SymbolFeed {
            symbol: "BTCUSDT".into(),
            interval: interval(),
        }]
    }

    pub fn candles_per_write() -> usize {
        500
    }

    pub fn publish_interval_ms() -> u64 {
        1_000
    }

    pub fn poll_interval_ms() -> u64 {
        250
    }
}

impl Default for QuartzConfig {
    fn default() -> Self {
        Self {
            region_name: defaults::region_name(),
            region_size: defaults::region_size(),
            log_level: defaults::log_level(),
            symbols: defaults::symbols(),
            candles_per_write: defaults::candles_per_write(),
            publish_interval_ms: defaults::publish_interval_ms(),
            poll_interval_ms: defaults::poll_interval_ms(),
        }
    }
}

impl QuartzConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}
