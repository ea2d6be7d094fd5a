use serde::Serialize;

use crate::arbitrage::route::{ArbitrageType, LegRole};
use crate::engine::types::{finite, MarketKey, Trade};

/// Simulated fill state of one leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOperation {
    pub exchange: String,
    pub hub: String,
    pub market: String,
    /// Size-weighted fill price; `None` until the first fill.
    pub price: Option<f64>,
    /// Filled size in market (base) units.
    pub size: f64,
    /// Filled notional in hub units.
    pub hub_size: f64,
    /// Filled size in basis units; `None` once any fill could not be valued.
    pub basis_size: Option<f64>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub filled: bool,
}

impl ExecutionOperation {
    pub fn new(key: &MarketKey) -> Self {
        Self {
            exchange: key.exchange.clone(),
            hub: key.hub.clone(),
            market: key.market.clone(),
            price: None,
            size: 0.0,
            hub_size: 0.0,
            basis_size: Some(0.0),
            start: None,
            end: None,
            filled: false,
        }
    }

    /// Add `size` filled at the trade's price, worth `basis` in the basis
    /// asset.
    pub fn fill(&mut self, trade: &Trade, size: f64, basis: Option<f64>) {
        let total = self.size + size;
        self.price = match self.price {
            Some(old) if total > 0.0 => finite((old * self.size + trade.price * size) / total),
            _ => Some(trade.price),
        };
        self.size = total;
        self.hub_size += trade.price * size;
        self.basis_size = self.basis_size.zip(basis).map(|(a, b)| a + b);
        self.start.get_or_insert(trade.time);
        self.end = Some(trade.time);
    }
}

/// One arbitrage cycle, possibly still in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadExecution {
    pub id: String,
    #[serde(rename = "type")]
    pub arb_type: ArbitrageType,
    /// Basis size the entry leg had to reach, fixed at creation.
    pub target_basis_size: f64,
    pub buy: ExecutionOperation,
    pub sell: ExecutionOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert: Option<ExecutionOperation>,
    pub entry_basis_size: Option<f64>,
    pub exit_basis_size: Option<f64>,
    pub entry_hub_size: Option<f64>,
    pub exit_hub_size: Option<f64>,
    pub spread: Option<f64>,
    pub hub_spread: Option<f64>,
    pub spread_percent: Option<f64>,
    pub spreads_per_minute: usize,
}

impl SpreadExecution {
    pub fn new(
        id: String,
        arb_type: ArbitrageType,
        target_basis_size: f64,
        buy: &MarketKey,
        sell: &MarketKey,
        convert: Option<&MarketKey>,
    ) -> Self {
        Self {
            id,
            arb_type,
            target_basis_size,
            buy: ExecutionOperation::new(buy),
            sell: ExecutionOperation::new(sell),
            convert: convert.map(ExecutionOperation::new),
            entry_basis_size: None,
            exit_basis_size: None,
            entry_hub_size: None,
            exit_hub_size: None,
            spread: None,
            hub_spread: None,
            spread_percent: None,
            spreads_per_minute: 0,
        }
    }

    pub fn leg(&self, role: LegRole) -> Option<&ExecutionOperation> {
        match role {
            LegRole::Buy => Some(&self.buy),
            LegRole::Sell => Some(&self.sell),
            LegRole::Convert => self.convert.as_ref(),
        }
    }

    pub fn leg_mut(&mut self, role: LegRole) -> Option<&mut ExecutionOperation> {
        match role {
            LegRole::Buy => Some(&mut self.buy),
            LegRole::Sell => Some(&mut self.sell),
            LegRole::Convert => self.convert.as_mut(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.buy.filled && self.sell.filled && self.convert.as_ref().map_or(true, |c| c.filled)
    }

    /// Latest fill time over all legs.
    pub fn end(&self) -> Option<u64> {
        [Some(&self.buy), Some(&self.sell), self.convert.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|leg| leg.end)
            .max()
    }

    /// Copy the entry/exit amounts onto the record and derive the spread
    /// metrics. The basis values are what the entry leg spent and the exit
    /// leg received; missing inputs leave the metrics unavailable.
    pub fn settle(&mut self, entry: LegRole, exit: LegRole, entry_basis: Option<f64>, exit_basis: Option<f64>) {
        self.entry_hub_size = self.leg(entry).map(|l| l.hub_size);
        self.exit_hub_size = self.leg(exit).map(|l| l.hub_size);
        self.entry_basis_size = entry_basis;
        self.exit_basis_size = exit_basis;

        self.spread = exit_basis.zip(entry_basis).and_then(|(x, e)| finite(x - e));
        self.hub_spread = self.exit_hub_size.zip(self.entry_hub_size).and_then(|(x, e)| finite(x - e));
        self.spread_percent = self.spread.zip(entry_basis).and_then(|(s, e)| finite(s / e));
    }

    pub fn meets_target(&self, spread_target: f64) -> bool {
        self.spread_percent.map_or(false, |p| p >= spread_target)
    }
}
