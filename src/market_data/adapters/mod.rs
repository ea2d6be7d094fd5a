// Shared trait + event for market data adapters

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::types::{BookLevelUpdate, GraphParameters, MarketKey, MarketParams, Side, Ticker};

/// One book level change for a named market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEvent {
    pub exchange: String,
    pub hub: String,
    pub market: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

impl BookEvent {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(&self.exchange, &self.hub, &self.market)
    }

    pub fn level(&self) -> BookLevelUpdate {
        BookLevelUpdate { side: self.side, price: self.price, size: self.size }
    }
}

/// Everything an adapter can deliver to the graph, tagged by `type` on the
/// wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MarketEvent {
    /// An exchange's `(hub, market)` listing.
    Symbols { exchange: String, pairs: Vec<(String, String)> },
    Ticker(Ticker),
    Book(BookEvent),
    /// The exchange finished publishing its initial listing.
    Ready { exchange: String },
    Params(GraphParameters),
    MarketParams(MarketParams),
}

#[async_trait::async_trait]
pub trait VenueAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Push events into the router until the source is exhausted or the
    /// receiving side goes away.
    async fn spawn(&self, tx: mpsc::Sender<MarketEvent>) -> anyhow::Result<()>;
}

pub mod replay;
