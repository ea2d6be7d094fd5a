//! Layered settings: built-in defaults, then an optional TOML file, then
//! `ARBX__`-prefixed environment variables (`ARBX__GRAPH__BASIS_SIZE=0.05`,
//! `ARBX__EXCHANGES=binance,kraken`).

use std::path::{Path, PathBuf};

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::arbitrage::StrategyLimits;
use crate::engine::types::GraphParameters;
use crate::error::ConfigError;

const DEFAULT_FILE: &str = "config/arbx";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphSettings {
    pub basis_asset: String,
    pub basis_size: f64,
    pub spread_target: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookSettings {
    /// Levels per side in published snapshots.
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategySettings {
    pub max_in_flight: usize,
    pub window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplaySettings {
    pub path: Option<PathBuf>,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSettings {
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsSettings {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub exchanges: Vec<String>,
    pub graph: GraphSettings,
    pub book: BookSettings,
    pub strategy: StrategySettings,
    pub replay: ReplaySettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
}

impl Settings {
    /// Load from `path`, or from `config/arbx.toml` when present, with
    /// environment overrides. A `.env` file is read first.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let config = defaults()?
            .add_source(file)
            .add_source(
                Environment::with_prefix("ARBX")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("exchanges")
                    .try_parsing(true),
            )
            .build()?;
        Self::finish(config)
    }

    /// Defaults overlaid with an in-memory TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config = defaults()?.add_source(File::from_str(toml, FileFormat::Toml)).build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "exchanges", reason: "at least one exchange is required".into() });
        }
        if self.graph.basis_asset.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "graph.basis_asset", reason: "empty symbol".into() });
        }
        if !(self.graph.basis_size.is_finite() && self.graph.basis_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "graph.basis_size",
                reason: format!("{} is not a positive size", self.graph.basis_size),
            });
        }
        if !self.graph.spread_target.is_finite() {
            return Err(ConfigError::Invalid { field: "graph.spread_target", reason: "not a finite number".into() });
        }
        if self.book.depth == 0 {
            return Err(ConfigError::Invalid { field: "book.depth", reason: "must be at least 1".into() });
        }
        if self.strategy.max_in_flight == 0 {
            return Err(ConfigError::Invalid { field: "strategy.max_in_flight", reason: "must be at least 1".into() });
        }
        if self.replay.channel_capacity == 0 {
            return Err(ConfigError::Invalid { field: "replay.channel_capacity", reason: "must be at least 1".into() });
        }
        Ok(())
    }

    pub fn graph_params(&self) -> GraphParameters {
        GraphParameters {
            basis_asset_symbol: self.graph.basis_asset.clone(),
            basis_size: self.graph.basis_size,
            spread_target: self.graph.spread_target,
        }
    }

    pub fn limits(&self) -> StrategyLimits {
        StrategyLimits {
            max_in_flight: self.strategy.max_in_flight,
            window_ms: self.strategy.window_secs.saturating_mul(1_000),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("graph.basis_asset", "BTC")?
        .set_default("graph.basis_size", 0.01)?
        .set_default("graph.spread_target", 0.0)?
        .set_default("book.depth", 25)?
        .set_default("strategy.max_in_flight", 16)?
        .set_default("strategy.window_secs", 60)?
        .set_default("replay.channel_capacity", 1024)?
        .set_default("logging.filter", "info")?
        .set_default("metrics.port", 9000)?)
}
