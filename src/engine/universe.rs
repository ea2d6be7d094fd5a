use ahash::AHashMap;
use tracing::debug;

use crate::engine::asset::Asset;
use crate::engine::exchange::{Exchange, Hub};
use crate::engine::market::Market;
use crate::engine::types::{AssetId, ExchangeId, HubId, MarketId, MarketKey};

/// Every asset, exchange, hub and market the graph has discovered.
///
/// Entities are created on first lookup and never removed, so ids handed out
/// here stay valid for the lifetime of the universe.
#[derive(Debug, Default)]
pub struct Universe {
    assets: Vec<Asset>,
    asset_index: AHashMap<String, AssetId>,
    exchanges: Vec<Exchange>,
    exchange_index: AHashMap<String, ExchangeId>,
    hubs: Vec<Hub>,
    markets: Vec<Market>,
    basis: Option<AssetId>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exchange(&mut self, name: &str) -> ExchangeId {
        if let Some(id) = self.exchange_index.get(name) {
            return *id;
        }
        let id = ExchangeId(self.exchanges.len());
        self.exchanges.push(Exchange::new(id, name));
        self.exchange_index.insert(name.to_string(), id);
        id
    }

    /// Get-or-create the asset for `symbol`.
    pub fn asset_for(&mut self, symbol: &str) -> AssetId {
        if let Some(id) = self.asset_index.get(symbol) {
            return *id;
        }
        let id = AssetId(self.assets.len());
        self.assets.push(Asset::new(id, symbol));
        self.asset_index.insert(symbol.to_string(), id);
        debug!(symbol, "Registered asset");
        id
    }

    /// Get-or-create the hub quoting in `symbol` on `exchange`.
    pub fn hub_for(&mut self, exchange: ExchangeId, symbol: &str) -> HubId {
        if let Some(id) = self.exchanges[exchange.0].hub(symbol) {
            return id;
        }
        let asset = self.asset_for(symbol);
        let id = HubId(self.hubs.len());
        self.hubs.push(Hub::new(id, exchange, asset, symbol));
        self.exchanges[exchange.0].insert_hub(symbol, id);
        self.assets[asset.0].add_hub(id);
        id
    }

    /// Get-or-create the market trading `symbol` under `hub`.
    pub fn market_for(&mut self, hub: HubId, symbol: &str) -> MarketId {
        if let Some(id) = self.hubs[hub.0].market(symbol) {
            return id;
        }
        let asset = self.asset_for(symbol);
        let (exchange, hub_symbol) = {
            let h = &self.hubs[hub.0];
            (h.exchange(), h.symbol().to_string())
        };
        let key = MarketKey::new(self.exchanges[exchange.0].name(), &hub_symbol, symbol);
        let id = MarketId(self.markets.len());
        debug!(market = %key, "Registered market");
        self.markets.push(Market::new(id, exchange, hub, asset, key));
        self.hubs[hub.0].insert_market(symbol, id);
        self.assets[asset.0].add_market(id);
        id
    }

    pub fn find_asset(&self, symbol: &str) -> Option<AssetId> {
        self.asset_index.get(symbol).copied()
    }

    pub fn find_exchange(&self, name: &str) -> Option<ExchangeId> {
        self.exchange_index.get(name).copied()
    }

    pub fn find_market(&self, key: &MarketKey) -> Option<MarketId> {
        let exchange = self.find_exchange(&key.exchange)?;
        let hub = self.exchanges[exchange.0].hub(&key.hub)?;
        self.hubs[hub.0].market(&key.market)
    }

    /// The market for `market_symbol` quoted in `hub_symbol` on `exchange`,
    /// i.e. the market that converts between the two currencies there. A
    /// currency never converts into itself.
    pub fn get_conversion(&self, exchange: ExchangeId, hub_symbol: &str, market_symbol: &str) -> Option<MarketId> {
        if hub_symbol == market_symbol {
            return None;
        }
        let hub = self.exchanges.get(exchange.0)?.hub(hub_symbol)?;
        self.hubs[hub.0].market(market_symbol)
    }

    /// Same quote currency on two different venues.
    pub fn is_simple_arb(&self, origin: MarketId, destination: MarketId) -> bool {
        let (o, d) = (&self.markets[origin.0], &self.markets[destination.0]);
        o.exchange() != d.exchange() && o.hub_symbol() == d.hub_symbol()
    }

    pub fn asset(&self, id: AssetId) -> &Asset {
        &self.assets[id.0]
    }

    pub fn exchange(&self, id: ExchangeId) -> &Exchange {
        &self.exchanges[id.0]
    }

    pub fn hub(&self, id: HubId) -> &Hub {
        &self.hubs[id.0]
    }

    pub fn market(&self, id: MarketId) -> &Market {
        &self.markets[id.0]
    }

    pub(crate) fn market_mut(&mut self, id: MarketId) -> &mut Market {
        &mut self.markets[id.0]
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn markets(&self) -> &[Market] {
        &self.markets
    }

    pub fn basis(&self) -> Option<AssetId> {
        self.basis
    }

    pub(crate) fn set_basis(&mut self, asset: AssetId) {
        self.basis = Some(asset);
    }
}
