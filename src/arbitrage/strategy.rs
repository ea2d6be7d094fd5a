use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::arbitrage::execution::SpreadExecution;
use crate::arbitrage::route::{LegRole, LegSpec, Route};
use crate::engine::channel::{EventChannel, SubscriptionId};
use crate::engine::types::{ArbId, GraphParameters, MarketId, Trade};
use crate::engine::universe::Universe;

pub const DEFAULT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

// Relative tolerance for "target reached".
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyLimits {
    /// Upper bound on queued in-flight spreads per strategy.
    pub max_in_flight: usize,
    /// Age limit of the completed-spread window, by end timestamp.
    pub window_ms: u64,
}

impl Default for StrategyLimits {
    fn default() -> Self {
        Self { max_in_flight: DEFAULT_MAX_IN_FLIGHT, window_ms: DEFAULT_WINDOW_MS }
    }
}

/// Detector and fill simulator for one route.
///
/// Entry-leg trades open spreads and fill the newest one; exit and
/// conversion trades fill the oldest spreads first. A spread completes when
/// every leg of its route is filled, is archived in the rolling window and
/// published.
#[derive(Debug)]
pub struct Arbitrage {
    id: ArbId,
    route: Route,
    limits: StrategyLimits,
    sequence: u64,
    in_flight: VecDeque<SpreadExecution>,
    recent: VecDeque<SpreadExecution>,
    updates: EventChannel<SpreadExecution>,
}

impl Arbitrage {
    pub fn new(id: ArbId, route: Route, limits: StrategyLimits) -> Self {
        Self {
            id,
            route,
            limits,
            sequence: 0,
            in_flight: VecDeque::new(),
            recent: VecDeque::new(),
            updates: EventChannel::new(),
        }
    }

    pub fn id(&self) -> ArbId {
        self.id
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &SpreadExecution> {
        self.in_flight.iter()
    }

    pub fn recent(&self) -> impl Iterator<Item = &SpreadExecution> {
        self.recent.iter()
    }

    pub fn spreads_per_minute(&self) -> usize {
        self.recent.len()
    }

    pub fn last_spread(&self) -> Option<&SpreadExecution> {
        self.recent.back()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SpreadExecution) + Send + 'static,
    {
        self.updates.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.updates.unsubscribe(id)
    }

    /// Feed a trade from `market` and return the spreads it completed.
    pub fn handle_trade(
        &mut self,
        market: MarketId,
        trade: &Trade,
        universe: &Universe,
        params: &GraphParameters,
    ) -> Vec<SpreadExecution> {
        let legs: SmallVec<[LegSpec; 3]> = self
            .route
            .legs()
            .iter()
            .filter(|leg| leg.market == market && leg.ticker_side == trade.side)
            .copied()
            .collect();
        for leg in &legs {
            match leg.role {
                LegRole::Buy => self.fill_entry(leg, trade, universe, params),
                LegRole::Sell => self.fill_exit(leg, trade, universe),
                LegRole::Convert => self.fill_convert(leg, trade, universe),
            }
        }
        self.complete(universe)
    }

    fn open(&mut self, target: f64, universe: &Universe) {
        self.sequence += 1;
        let id = format!("{}#{}", self.route.id(), self.sequence);
        let conversion = self.route.conversion().map(|m| universe.market(m).key());
        let spread = SpreadExecution::new(
            id,
            self.route.arb_type(),
            target,
            universe.market(self.route.origin()).key(),
            universe.market(self.route.destination()).key(),
            conversion,
        );
        trace!(spread = %spread.id, target, "Spread opened");
        self.in_flight.push_back(spread);
    }

    fn fill_entry(&mut self, leg: &LegSpec, trade: &Trade, universe: &Universe, params: &GraphParameters) {
        let Some(mut available) = universe.basis_size(leg.market, trade.size, trade.price) else {
            trace!(arb = self.route.id(), "Entry trade has no basis value");
            return;
        };
        if !(params.basis_size > 0.0) {
            return;
        }

        while available > EPSILON * params.basis_size {
            let mut opened = false;
            if self.in_flight.back().map_or(true, |s| s.buy.filled) {
                if self.in_flight.len() >= self.limits.max_in_flight {
                    debug!(arb = self.route.id(), in_flight = self.in_flight.len(), "In-flight limit reached");
                    return;
                }
                self.open(params.basis_size, universe);
                opened = true;
            }
            let Some(spread) = self.in_flight.back_mut() else { return };

            let remaining = spread.target_basis_size - spread.buy.basis_size.unwrap_or_default();
            let take = available.min(remaining);
            let Some(size) = universe.market_size(leg.market, take, trade.price) else {
                if opened {
                    self.in_flight.pop_back();
                }
                return;
            };
            spread.buy.fill(trade, size, Some(take));
            available -= take;

            if remaining - take <= EPSILON * spread.target_basis_size {
                spread.buy.filled = true;
                debug!(spread = %spread.id, size = spread.buy.size, price = ?spread.buy.price, "Entry leg filled");
            }
        }
    }

    fn fill_exit(&mut self, leg: &LegSpec, trade: &Trade, universe: &Universe) {
        let mut available = trade.size;
        for spread in self.in_flight.iter_mut().filter(|s| s.buy.filled && !s.sell.filled) {
            if available <= 0.0 {
                break;
            }
            let remaining = spread.buy.size - spread.sell.size;
            let take = available.min(remaining);
            spread.sell.fill(trade, take, universe.basis_size(leg.market, take, trade.price));
            available -= take;

            if remaining - take <= EPSILON * spread.buy.size {
                spread.sell.filled = true;
                debug!(spread = %spread.id, size = spread.sell.size, price = ?spread.sell.price, "Exit leg filled");
            }
        }
    }

    fn fill_convert(&mut self, leg: &LegSpec, trade: &Trade, universe: &Universe) {
        let Some(source) = self.route.convert_source() else { return };
        let mut available = trade.size;
        for spread in self.in_flight.iter_mut() {
            if available <= 0.0 {
                break;
            }
            // the conversion has to move exactly the hub amount of its source leg
            let Some(target) = spread.leg(source).filter(|l| l.filled).map(|l| l.hub_size) else {
                continue;
            };
            let Some(convert) = spread.convert.as_mut().filter(|c| !c.filled) else { continue };

            let remaining = target - convert.size;
            let take = available.min(remaining);
            convert.fill(trade, take, universe.basis_size(leg.market, take, trade.price));
            available -= take;

            if remaining - take <= EPSILON * target {
                convert.filled = true;
                debug!(spread = %spread.id, size = convert.size, price = ?convert.price, "Conversion leg filled");
            }
        }
    }

    /// Basis value of the hub amount moved by `role`'s leg.
    fn hub_value(&self, spread: &SpreadExecution, role: LegRole, universe: &Universe) -> Option<f64> {
        let market = universe.market(self.route.leg(role)?.market);
        let hub_size = spread.leg(role)?.hub_size;
        universe.hub_to_basis(market.exchange(), market.hub_symbol(), hub_size)
    }

    fn complete(&mut self, universe: &Universe) -> Vec<SpreadExecution> {
        let mut completed = Vec::new();
        while self.in_flight.front().map_or(false, SpreadExecution::is_complete) {
            let Some(mut spread) = self.in_flight.pop_front() else { break };
            let (entry, exit) = (self.route.entry_role(), self.route.exit_role());
            let entry_basis = self.hub_value(&spread, entry, universe);
            let exit_basis = self.hub_value(&spread, exit, universe);
            spread.settle(entry, exit, entry_basis, exit_basis);

            let end = spread.end().unwrap_or_default();
            let window = self.limits.window_ms;
            self.recent.retain(|s| s.end().map_or(false, |t| end.saturating_sub(t) <= window));
            self.recent.push_back(spread.clone());
            spread.spreads_per_minute = self.recent.len();
            if let Some(archived) = self.recent.back_mut() {
                archived.spreads_per_minute = spread.spreads_per_minute;
            }

            debug!(spread = %spread.id, value = ?spread.spread, percent = ?spread.spread_percent, "Spread completed");
            self.updates.publish(&spread);
            completed.push(spread);
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::route::{ArbitrageType, Initiation, RouteKind};
    use crate::engine::types::{MarketKey, Side};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Fixture {
        universe: Universe,
        params: GraphParameters,
    }

    impl Fixture {
        fn new(pairs: &[(&str, &str, &str)]) -> Self {
            let mut universe = Universe::new();
            for (exchange, hub, market) in pairs {
                let ex = universe.add_exchange(exchange);
                let hub = universe.hub_for(ex, hub);
                universe.market_for(hub, market);
            }
            if let Some(btc) = universe.find_asset("BTC") {
                universe.set_basis(btc);
            }
            Self { universe, params: GraphParameters::default() }
        }

        fn market(&self, exchange: &str, hub: &str, market: &str) -> MarketId {
            self.universe.find_market(&MarketKey::new(exchange, hub, market)).unwrap()
        }

        fn seed_price(&mut self, market: MarketId, price: f64) {
            for side in Side::ALL {
                self.universe
                    .market_mut(market)
                    .stats_mut(side)
                    .handle_trade(Trade { side, price, size: 1.0, time: 0 }, None);
            }
        }

        fn direct(&self, initiation: Initiation) -> Arbitrage {
            let route = Route::new(
                &self.universe,
                ArbitrageType::new(initiation, RouteKind::Direct),
                self.market("a", "BTC", "ETH"),
                self.market("b", "BTC", "ETH"),
                None,
            );
            Arbitrage::new(ArbId(0), route, StrategyLimits::default())
        }

        fn feed(&self, arb: &mut Arbitrage, market: MarketId, side: Side, price: f64, size: f64, time: u64) -> Vec<SpreadExecution> {
            arb.handle_trade(market, &Trade { side, price, size, time }, &self.universe, &self.params)
        }
    }

    fn direct_fixture() -> Fixture {
        Fixture::new(&[("a", "BTC", "ETH"), ("b", "BTC", "ETH")])
    }

    #[test]
    fn maker_direct_fills_entry_then_exit() {
        let f = direct_fixture();
        let (origin, destination) = (f.market("a", "BTC", "ETH"), f.market("b", "BTC", "ETH"));
        let mut arb = f.direct(Initiation::Maker);
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        arb.subscribe(move |s: &SpreadExecution| sink.lock().push(s.id.clone()));

        // 2 x 0.005 BTC worth of ETH at 100 BTC/ETH
        assert!(f.feed(&mut arb, origin, Side::Sell, 100.0, 0.00005, 1).is_empty());
        assert!(!arb.in_flight().next().unwrap().buy.filled);
        assert!(f.feed(&mut arb, origin, Side::Sell, 100.0, 0.00005, 2).is_empty());
        let head = arb.in_flight().next().unwrap();
        assert!(head.buy.filled);
        assert!(!head.sell.filled);

        // taker-side ticks on the origin do not feed a maker entry
        assert!(f.feed(&mut arb, origin, Side::Buy, 100.0, 1.0, 3).is_empty());
        assert_eq!(arb.in_flight().count(), 1);

        let done = f.feed(&mut arb, destination, Side::Buy, 101.0, 0.0001, 4);
        assert_eq!(done.len(), 1);
        let spread = &done[0];
        assert_eq!(spread.arb_type.as_str(), "MakerDirect");
        assert!(spread.sell.filled);
        let expected = spread.exit_basis_size.unwrap() - spread.entry_basis_size.unwrap();
        assert_eq!(spread.spread, Some(expected));
        assert!((expected - 0.0001).abs() < 1e-12);
        assert!((spread.spread_percent.unwrap() - 0.01).abs() < 1e-9);
        assert_eq!(spread.spreads_per_minute, 1);
        assert_eq!(arb.in_flight().count(), 0);
        assert_eq!(*published.lock(), vec![spread.id.clone()]);
    }

    #[test]
    fn exit_before_entry_is_ignored() {
        let f = direct_fixture();
        let mut arb = f.direct(Initiation::Taker);
        assert!(f.feed(&mut arb, f.market("b", "BTC", "ETH"), Side::Sell, 101.0, 1.0, 1).is_empty());
        assert_eq!(arb.in_flight().count(), 0);
    }

    #[test]
    fn large_entry_spills_into_new_spreads() {
        let f = direct_fixture();
        let origin = f.market("a", "BTC", "ETH");
        let mut arb = f.direct(Initiation::Taker);
        // 0.025 BTC worth: two full entries and a partial third
        f.feed(&mut arb, origin, Side::Buy, 100.0, 0.00025, 1);
        let filled: Vec<bool> = arb.in_flight().map(|s| s.buy.filled).collect();
        assert_eq!(filled, vec![true, true, false]);
        let partial = arb.in_flight().last().unwrap();
        assert!((partial.buy.basis_size.unwrap() - 0.005).abs() < 1e-12);

        // one exit trade settles both filled entries in order
        let done = f.feed(&mut arb, f.market("b", "BTC", "ETH"), Side::Sell, 99.0, 0.0002, 2);
        assert_eq!(done.len(), 2);
        assert!(done[0].id.ends_with("#1"));
        assert!(done[1].id.ends_with("#2"));
        assert!(done[0].spread.unwrap() < 0.0);
        assert_eq!(done[1].spreads_per_minute, 2);
        assert_eq!(arb.in_flight().count(), 1);
    }

    #[test]
    fn in_flight_queue_is_bounded() {
        let f = direct_fixture();
        let route = f.direct(Initiation::Taker).route().clone();
        let mut arb = Arbitrage::new(ArbId(0), route, StrategyLimits { max_in_flight: 2, ..Default::default() });
        f.feed(&mut arb, f.market("a", "BTC", "ETH"), Side::Buy, 100.0, 0.001, 1);
        assert_eq!(arb.in_flight().count(), 2);
    }

    #[test]
    fn unresolved_basis_creates_nothing() {
        let mut f = direct_fixture();
        f.universe = Universe::new();
        let ex = f.universe.add_exchange("a");
        let hub = f.universe.hub_for(ex, "USDT");
        let origin = f.universe.market_for(hub, "ETH");
        let route = Route::new(
            &f.universe,
            ArbitrageType::new(Initiation::Taker, RouteKind::Direct),
            origin,
            origin,
            None,
        );
        let mut arb = Arbitrage::new(ArbId(0), route, StrategyLimits::default());
        assert!(f.feed(&mut arb, origin, Side::Buy, 1000.0, 1.0, 1).is_empty());
        assert_eq!(arb.in_flight().count(), 0);
    }

    #[test]
    fn parameter_change_keeps_in_flight_target() {
        let mut f = direct_fixture();
        let origin = f.market("a", "BTC", "ETH");
        let mut arb = f.direct(Initiation::Taker);
        f.feed(&mut arb, origin, Side::Buy, 100.0, 0.00005, 1);
        f.params.basis_size = 1.0;
        f.feed(&mut arb, origin, Side::Buy, 100.0, 0.00005, 2);
        let head = arb.in_flight().next().unwrap();
        assert_eq!(head.target_basis_size, 0.01);
        assert!(head.buy.filled);
    }

    #[test]
    fn window_prunes_spreads_older_than_a_minute() {
        let f = direct_fixture();
        let (origin, destination) = (f.market("a", "BTC", "ETH"), f.market("b", "BTC", "ETH"));
        let mut arb = f.direct(Initiation::Taker);
        let cycle = |arb: &mut Arbitrage, time: u64| {
            f.feed(arb, origin, Side::Buy, 100.0, 0.0001, time);
            let done = f.feed(arb, destination, Side::Sell, 100.5, 0.0001, time);
            assert_eq!(done.len(), 1);
            done[0].spreads_per_minute
        };
        assert_eq!(cycle(&mut arb, 0), 1);
        assert_eq!(cycle(&mut arb, 30_000), 2);
        assert_eq!(cycle(&mut arb, 60_000), 3);
        // 0 and 30_000 are now more than a minute old
        assert_eq!(cycle(&mut arb, 90_001), 2);
        assert_eq!(arb.spreads_per_minute(), 2);
        assert_eq!(arb.last_spread().map(|s| s.spreads_per_minute), Some(2));
    }

    #[test]
    fn destination_conversion_needs_three_legs() {
        let mut f = Fixture::new(&[("a", "USDT", "ETH"), ("b", "BTC", "ETH"), ("b", "USDT", "BTC")]);
        let (origin, destination, conversion) =
            (f.market("a", "USDT", "ETH"), f.market("b", "BTC", "ETH"), f.market("b", "USDT", "BTC"));
        f.seed_price(conversion, 20_000.0);
        let route = Route::new(
            &f.universe,
            ArbitrageType::new(Initiation::Taker, RouteKind::DestinationConversion),
            origin,
            destination,
            Some(conversion),
        );
        let mut arb = Arbitrage::new(ArbId(0), route, StrategyLimits::default());

        // 0.01 BTC = 200 USDT = 0.2 ETH at 1000
        assert!(f.feed(&mut arb, origin, Side::Buy, 1000.0, 0.2, 1).is_empty());
        // conversion cannot start before the exit leg is filled
        assert!(f.feed(&mut arb, conversion, Side::Sell, 20_000.0, 0.0102, 2).is_empty());
        assert!(f.feed(&mut arb, destination, Side::Sell, 0.051, 0.2, 3).is_empty());
        let head = arb.in_flight().next().unwrap();
        assert!(head.sell.filled);
        assert_eq!(head.convert.as_ref().map(|c| c.filled), Some(false));

        let done = f.feed(&mut arb, conversion, Side::Sell, 20_000.0, 0.05, 4);
        assert_eq!(done.len(), 1);
        let spread = &done[0];
        assert!((spread.entry_hub_size.unwrap() - 200.0).abs() < 1e-9);
        assert!((spread.exit_hub_size.unwrap() - 204.0).abs() < 1e-9);
        assert!((spread.hub_spread.unwrap() - 4.0).abs() < 1e-9);
        assert!((spread.spread.unwrap() - 0.0002).abs() < 1e-12);
        assert!((spread.spread_percent.unwrap() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn origin_conversion_converts_before_completion() {
        let mut f = Fixture::new(&[("a", "USDT", "ETH"), ("b", "BTC", "ETH"), ("b", "USDT", "BTC")]);
        let (origin, destination, conversion) =
            (f.market("b", "BTC", "ETH"), f.market("a", "USDT", "ETH"), f.market("b", "USDT", "BTC"));
        f.seed_price(conversion, 20_000.0);
        let route = Route::new(
            &f.universe,
            ArbitrageType::new(Initiation::Maker, RouteKind::OriginConversion),
            origin,
            destination,
            Some(conversion),
        );
        let mut arb = Arbitrage::new(ArbId(0), route, StrategyLimits::default());

        // maker entry: buy 0.2 ETH for 0.01 BTC on b, filled by sellers
        f.feed(&mut arb, origin, Side::Sell, 0.05, 0.2, 1);
        // maker exit: sell 0.2 ETH for USDT on a, filled by buyers
        assert!(f.feed(&mut arb, destination, Side::Buy, 1010.0, 0.2, 2).is_empty());
        // maker conversion: buy 0.01 BTC with USDT on b, filled by sellers
        let done = f.feed(&mut arb, conversion, Side::Sell, 20_000.0, 0.01, 3);
        assert_eq!(done.len(), 1);
        let spread = &done[0];
        // spent 200 USDT on the conversion, received 202 USDT
        assert!((spread.entry_hub_size.unwrap() - 200.0).abs() < 1e-9);
        assert!((spread.hub_spread.unwrap() - 2.0).abs() < 1e-9);
        assert!((spread.spread.unwrap() - 0.0001).abs() < 1e-12);
    }
}
