//! Cross-exchange arbitrage detection over a live market graph.
//!
//! Adapters deliver tickers and book updates; the [`MarketGraph`] keeps
//! rolling VWAP statistics per market side, classifies arbitrage routes
//! between venues once every exchange is ready, and simulates multi-leg
//! fills to publish completed [`SpreadExecution`]s.

pub mod arbitrage;
pub mod config;
pub mod engine;
pub mod error;
pub mod market_data;
pub mod telemetry;

pub use arbitrage::SpreadExecution;
pub use engine::graph::{BookSnapshot, MarketGraph};
pub use error::{ConfigError, GraphError};
