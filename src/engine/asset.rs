use crate::engine::types::{AssetId, HubId, MarketId};

/// A currency, shared by every venue that trades it.
///
/// Hubs quoting in this currency and markets trading it as their base are
/// kept as back-references so conversions can find alternative venues.
#[derive(Debug, Clone)]
pub struct Asset {
    id: AssetId,
    symbol: String,
    hubs: Vec<HubId>,
    markets: Vec<MarketId>,
}

impl Asset {
    pub(crate) fn new(id: AssetId, symbol: &str) -> Self {
        Self { id, symbol: symbol.to_string(), hubs: Vec::new(), markets: Vec::new() }
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn hubs(&self) -> &[HubId] {
        &self.hubs
    }

    pub fn markets(&self) -> &[MarketId] {
        &self.markets
    }

    pub(crate) fn add_hub(&mut self, hub: HubId) {
        self.hubs.push(hub);
    }

    pub(crate) fn add_market(&mut self, market: MarketId) {
        self.markets.push(market);
    }
}
