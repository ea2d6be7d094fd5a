use smallvec::SmallVec;

use crate::engine::book::OrderBook;
use crate::engine::stats::VolumeStatistics;
use crate::engine::types::{ArbId, AssetId, ExchangeId, HubId, MarketId, MarketKey, Side};

pub const DEFAULT_PRICE_PRECISION: u32 = 8;
pub const DEFAULT_SIZE_PRECISION: u32 = 8;

/// A trading pair: `asset` (base) priced in the hub's currency on one
/// exchange.
#[derive(Debug, Clone)]
pub struct Market {
    id: MarketId,
    exchange: ExchangeId,
    hub: HubId,
    asset: AssetId,
    key: MarketKey,
    pub price_precision: u32,
    pub size_precision: u32,
    book: OrderBook,
    buy: VolumeStatistics,
    sell: VolumeStatistics,
    // strategies fed by this market's tickers, per aggressor side
    listeners: [SmallVec<[ArbId; 4]>; 2],
}

impl Market {
    pub(crate) fn new(id: MarketId, exchange: ExchangeId, hub: HubId, asset: AssetId, key: MarketKey) -> Self {
        Self {
            id,
            exchange,
            hub,
            asset,
            key,
            price_precision: DEFAULT_PRICE_PRECISION,
            size_precision: DEFAULT_SIZE_PRECISION,
            book: OrderBook::new(),
            buy: VolumeStatistics::new(),
            sell: VolumeStatistics::new(),
            listeners: Default::default(),
        }
    }

    pub fn id(&self) -> MarketId {
        self.id
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn hub(&self) -> HubId {
        self.hub
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn key(&self) -> &MarketKey {
        &self.key
    }

    pub fn symbol(&self) -> &str {
        &self.key.market
    }

    pub fn hub_symbol(&self) -> &str {
        &self.key.hub
    }

    pub fn exchange_name(&self) -> &str {
        &self.key.exchange
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub(crate) fn book_mut(&mut self) -> &mut OrderBook {
        &mut self.book
    }

    pub fn stats(&self, side: Side) -> &VolumeStatistics {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    pub(crate) fn stats_mut(&mut self, side: Side) -> &mut VolumeStatistics {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    pub fn vwap(&self, side: Side) -> Option<f64> {
        self.stats(side).vwap()
    }

    /// Reference price for conversions: the mean of both sides' VWAPs, or
    /// whichever side is known.
    pub fn price(&self) -> Option<f64> {
        let price = match (self.buy.vwap(), self.sell.vwap()) {
            (Some(b), Some(s)) => Some((b + s) / 2.0),
            (b, s) => b.or(s),
        };
        price.filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn listeners(&self, side: Side) -> &[ArbId] {
        &self.listeners[side.index()]
    }

    pub(crate) fn subscribe(&mut self, side: Side, arb: ArbId) -> bool {
        let list = &mut self.listeners[side.index()];
        if list.contains(&arb) {
            return false;
        }
        list.push(arb);
        true
    }

    pub(crate) fn unsubscribe(&mut self, side: Side, arb: ArbId) -> bool {
        let list = &mut self.listeners[side.index()];
        match list.iter().position(|a| *a == arb) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }
}
