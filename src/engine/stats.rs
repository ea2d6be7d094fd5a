use std::collections::VecDeque;

use tracing::trace;

use crate::engine::types::Trade;

/// Rolling volume-weighted average price for one side of one market.
///
/// The window holds only the most recent volume needed to execute one
/// basis-size trade; the caller supplies that target, already converted to
/// market units, with every trade.
#[derive(Debug, Clone, Default)]
pub struct VolumeStatistics {
    window: VecDeque<Trade>,
    numerator: f64,
    denominator: f64,
    last_price: Option<f64>,
}

impl VolumeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size-weighted average over the window, else the last observed price.
    pub fn vwap(&self) -> Option<f64> {
        if self.denominator != 0.0 {
            Some(self.numerator / self.denominator)
        } else {
            self.last_price
        }
    }

    /// Trim the window down to `target` (oldest first), then append `trade`.
    /// An unavailable target skips trimming but never the append.
    pub fn handle_trade(&mut self, trade: Trade, target: Option<f64>) {
        if let Some(target) = target.filter(|t| !t.is_nan()) {
            while target < self.denominator {
                let Some(oldest) = self.window.pop_front() else { break };
                self.remove(&oldest);
            }
        }
        self.add(trade);
        self.last_price = Some(trade.price);
        trace!(len = self.window.len(), size = self.denominator, "Window updated");
    }

    /// Record a quoted price without a trade.
    pub fn observe_price(&mut self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.last_price = Some(price);
        }
    }

    fn add(&mut self, trade: Trade) {
        self.numerator += trade.price * trade.size;
        self.denominator += trade.size;
        self.window.push_back(trade);
    }

    fn remove(&mut self, trade: &Trade) {
        if self.window.is_empty() {
            self.numerator = 0.0;
            self.denominator = 0.0;
        } else {
            self.numerator -= trade.price * trade.size;
            self.denominator -= trade.size;
        }
    }

    pub fn window(&self) -> impl Iterator<Item = &Trade> {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn numerator(&self) -> f64 {
        self.numerator
    }

    /// Total size currently in the window.
    pub fn denominator(&self) -> f64 {
        self.denominator
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }
}
