//! Basis-size conversions.
//!
//! All position sizing is expressed in the basis asset. Converting a basis
//! amount into a market's own units walks at most two hops: basis to the
//! market's hub currency through a conversion market, then hub to the
//! market's base at the given price. Any missing market or price makes the
//! result unavailable (`None`).

use crate::engine::types::{finite, ExchangeId, MarketId};
use crate::engine::universe::Universe;

impl Universe {
    pub fn basis_symbol(&self) -> Option<&str> {
        self.basis().map(|id| self.asset(id).symbol())
    }

    /// How many units of `to` one unit of `from` is worth. Prefers a market
    /// on `exchange`; falls back to the same pair on any other venue.
    pub fn rate(&self, exchange: ExchangeId, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        let local = self
            .get_conversion(exchange, to, from)
            .and_then(|m| self.market(m).price())
            .or_else(|| {
                self.get_conversion(exchange, from, to)
                    .and_then(|m| self.market(m).price())
                    .and_then(|p| finite(1.0 / p))
            });
        local.or_else(|| self.any_venue_rate(from, to))
    }

    fn any_venue_rate(&self, from: &str, to: &str) -> Option<f64> {
        let direct = self.find_asset(from).and_then(|asset| {
            self.asset(asset)
                .markets()
                .iter()
                .map(|id| self.market(*id))
                .filter(|m| m.hub_symbol() == to)
                .find_map(|m| m.price())
        });
        direct.or_else(|| {
            let asset = self.find_asset(to)?;
            self.asset(asset)
                .markets()
                .iter()
                .map(|id| self.market(*id))
                .filter(|m| m.hub_symbol() == from)
                .find_map(|m| m.price())
                .and_then(|p| finite(1.0 / p))
        })
    }

    /// Basis amount expressed in `hub_symbol` on `exchange`.
    pub fn basis_to_hub(&self, exchange: ExchangeId, hub_symbol: &str, basis_size: f64) -> Option<f64> {
        let rate = self.rate(exchange, self.basis_symbol()?, hub_symbol)?;
        finite(basis_size * rate)
    }

    /// Hub-currency amount on `exchange` expressed in the basis asset.
    pub fn hub_to_basis(&self, exchange: ExchangeId, hub_symbol: &str, hub_size: f64) -> Option<f64> {
        let rate = self.rate(exchange, hub_symbol, self.basis_symbol()?)?;
        finite(hub_size * rate)
    }

    /// Basis amount expressed in `market`'s base units at `price`.
    pub fn market_size(&self, market: MarketId, basis_size: f64, price: f64) -> Option<f64> {
        let basis = self.basis()?;
        let m = self.market(market);
        if m.asset() == basis {
            return finite(basis_size);
        }
        if !(price.is_finite() && price > 0.0) {
            return None;
        }
        let hub_size = self.basis_to_hub(m.exchange(), m.hub_symbol(), basis_size)?;
        finite(hub_size / price)
    }

    /// `size` base units of `market` at `price`, expressed in the basis asset.
    pub fn basis_size(&self, market: MarketId, size: f64, price: f64) -> Option<f64> {
        let basis = self.basis()?;
        let m = self.market(market);
        if m.asset() == basis {
            return finite(size);
        }
        self.hub_to_basis(m.exchange(), m.hub_symbol(), size * price)
    }
}
