use ahash::AHashMap;

use crate::engine::types::{AssetId, ExchangeId, HubId, MarketId};

/// One external venue. Owns its hubs, keyed by quote symbol.
#[derive(Debug, Clone)]
pub struct Exchange {
    id: ExchangeId,
    name: String,
    hubs: AHashMap<String, HubId>,
}

impl Exchange {
    pub(crate) fn new(id: ExchangeId, name: &str) -> Self {
        Self { id, name: name.to_string(), hubs: AHashMap::new() }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hub(&self, symbol: &str) -> Option<HubId> {
        self.hubs.get(symbol).copied()
    }

    pub fn hub_count(&self) -> usize {
        self.hubs.len()
    }

    pub(crate) fn insert_hub(&mut self, symbol: &str, hub: HubId) {
        self.hubs.insert(symbol.to_string(), hub);
    }
}

/// A quote currency on one exchange. Owns the markets priced in it, keyed by
/// base symbol.
#[derive(Debug, Clone)]
pub struct Hub {
    id: HubId,
    exchange: ExchangeId,
    asset: AssetId,
    symbol: String,
    markets: AHashMap<String, MarketId>,
}

impl Hub {
    pub(crate) fn new(id: HubId, exchange: ExchangeId, asset: AssetId, symbol: &str) -> Self {
        Self { id, exchange, asset, symbol: symbol.to_string(), markets: AHashMap::new() }
    }

    pub fn id(&self) -> HubId {
        self.id
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn market(&self, symbol: &str) -> Option<MarketId> {
        self.markets.get(symbol).copied()
    }

    pub fn markets(&self) -> impl Iterator<Item = MarketId> + '_ {
        self.markets.values().copied()
    }

    pub(crate) fn insert_market(&mut self, symbol: &str, market: MarketId) {
        self.markets.insert(symbol.to_string(), market);
    }
}
