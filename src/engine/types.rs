use std::fmt;

use serde::{Deserialize, Serialize};

/// Side of a trade or of the book.
///
/// For tickers this is the aggressor side: a `Buy` ticker lifted the ask, a
/// `Sell` ticker hit the bid. For book updates `Buy` addresses bid levels and
/// `Sell` addresses ask levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Buy, Side::Sell];

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

// Arena handles. Assets, exchanges, hubs and markets live for the whole
// process, so plain indices never dangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HubId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArbId(pub(crate) usize);

/// Trade/quote event as delivered by an exchange adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub exchange_symbol: String,
    pub hub_symbol: String,
    pub market_symbol: String,
    /// Epoch milliseconds.
    pub time: u64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub best_bid: Option<f64>,
    #[serde(default)]
    pub best_ask: Option<f64>,
}

impl Ticker {
    /// The executed trade carried by this ticker, if it has a usable price,
    /// size and side.
    pub fn trade(&self) -> Option<Trade> {
        let price = self.price.filter(|p| p.is_finite() && *p > 0.0)?;
        let size = self.size.filter(|s| s.is_finite() && *s > 0.0)?;
        let side = self.side?;
        Some(Trade { side, price, size, time: self.time })
    }

    pub fn key(&self) -> MarketKey {
        MarketKey::new(&self.exchange_symbol, &self.hub_symbol, &self.market_symbol)
    }
}

/// Numeric part of a trade ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub time: u64,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevelUpdate {
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

/// Names one market: `exchange` / `hub` (quote) / `market` (base).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub exchange: String,
    pub hub: String,
    pub market: String,
}

impl MarketKey {
    pub fn new(exchange: &str, hub: &str, market: &str) -> Self {
        Self { exchange: exchange.to_string(), hub: hub.to_string(), market: market.to_string() }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.exchange, self.hub, self.market)
    }
}

/// Runtime-tunable graph parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphParameters {
    /// Symbol all sizing is normalised to, e.g. `BTC`.
    pub basis_asset_symbol: String,
    /// Size of one simulated arbitrage cycle, in basis units.
    pub basis_size: f64,
    /// Minimum `spread_percent` a completed spread must reach to be reported
    /// as an opportunity.
    pub spread_target: f64,
}

impl Default for GraphParameters {
    fn default() -> Self {
        Self { basis_asset_symbol: "BTC".into(), basis_size: 0.01, spread_target: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParams {
    #[serde(flatten)]
    pub key: MarketKey,
    pub price_precision: u32,
    pub size_precision: u32,
}

/// Finite values only; everything else is "currently unavailable".
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
