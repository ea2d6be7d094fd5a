use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{trace, warn};

use crate::engine::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

/// One grouped level of an aggregated book, with the cumulative depth from
/// the best price down to and including this level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateLevel {
    pub price: f64,
    pub size: f64,
    pub aggregate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSide {
    pub levels: Vec<AggregateLevel>,
    pub max_size: f64,
    pub total_size: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateBook {
    pub bids: AggregateSide,
    pub asks: AggregateSide,
}

/// Price-level book for one market. Levels with no size are removed, never
/// kept at zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    bids: BTreeMap<OrderedFloat<f64>, Level>,
    asks: BTreeMap<OrderedFloat<f64>, Level>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn side(&self, side: Side) -> &BTreeMap<OrderedFloat<f64>, Level> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<OrderedFloat<f64>, Level> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Upsert (`size > 0`) or delete (`size <= 0`) the level at exactly
    /// `price`.
    pub fn update_level(&mut self, side: Side, price: f64, size: f64) {
        if !price.is_finite() || size.is_nan() {
            warn!(%side, price, size, "Ignoring book update with non-finite values");
            return;
        }
        let levels = self.side_mut(side);
        if size > 0.0 {
            levels.insert(OrderedFloat(price), Level { price, size });
            trace!(%side, price, size, "Level set");
        } else if levels.remove(&OrderedFloat(price)).is_some() {
            trace!(%side, price, "Level removed");
        }
    }

    pub fn level(&self, side: Side, price: f64) -> Option<&Level> {
        self.side(side).get(&OrderedFloat(price))
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.values().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.values().next().copied()
    }

    pub fn depth(&self, side: Side) -> usize {
        self.side(side).len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Group levels to `precision` decimals and keep the best `take` per
    /// side. A zero-size level is added at each marker price (rounded the
    /// same way) when no grouped level sits there.
    pub fn aggregate(
        &self,
        take: usize,
        precision: u32,
        bid_marker: Option<f64>,
        ask_marker: Option<f64>,
    ) -> AggregateBook {
        let bids = group(&self.bids, precision, bid_marker);
        let asks = group(&self.asks, precision, ask_marker);
        AggregateBook {
            bids: accumulate(bids.into_iter().rev().take(take)),
            asks: accumulate(asks.into_iter().take(take)),
        }
    }
}

/// Most decimals an f64 price can be grouped to.
pub const MAX_PRECISION: u32 = 15;

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (value * factor).round() / factor
}

fn group(
    levels: &BTreeMap<OrderedFloat<f64>, Level>,
    precision: u32,
    marker: Option<f64>,
) -> BTreeMap<OrderedFloat<f64>, f64> {
    let mut grouped: BTreeMap<OrderedFloat<f64>, f64> = BTreeMap::new();
    for level in levels.values() {
        *grouped.entry(OrderedFloat(round_to(level.price, precision))).or_default() += level.size;
    }
    if let Some(price) = marker.filter(|p| p.is_finite()) {
        grouped.entry(OrderedFloat(round_to(price, precision))).or_insert(0.0);
    }
    grouped
}

fn accumulate(levels: impl Iterator<Item = (OrderedFloat<f64>, f64)>) -> AggregateSide {
    let mut side = AggregateSide::default();
    for (price, size) in levels {
        side.total_size += size;
        side.max_size = side.max_size.max(size);
        side.levels.push(AggregateLevel { price: price.into_inner(), size, aggregate: side.total_size });
    }
    side
}
