use thiserror::Error;

use crate::engine::types::MarketKey;

/// Errors returned by graph operations. None of them is fatal: callers log
/// and drop the offending event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),

    #[error("malformed symbol on {exchange}: hub '{hub}', market '{market}'")]
    MalformedSymbol { exchange: String, hub: String, market: String },

    #[error("unknown market {0}")]
    UnknownMarket(MarketKey),

    #[error("invalid value for {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
