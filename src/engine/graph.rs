//! The market graph: entity registry, arbitrage catalog and event fan-out.
//!
//! One `MarketGraph` is owned by a single dispatch loop. Every update runs to
//! completion before the next one is accepted: a ticker mutates its market's
//! statistics, then the strategies listening on that market and side run in
//! registration order, and any spreads they complete are republished on the
//! graph's spread channel.

use ahash::{AHashMap, AHashSet};
use ordered_float::OrderedFloat;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info, instrument, warn};

use crate::arbitrage::route::{candidate_routes, Initiation, RouteKind};
use crate::arbitrage::{Arbitrage, SpreadExecution, StrategyLimits};
use crate::engine::book::{AggregateLevel, MAX_PRECISION};
use crate::engine::channel::{EventChannel, SubscriptionId};
use crate::engine::market::Market;
use crate::engine::types::{
    ArbId, AssetId, BookLevelUpdate, ExchangeId, GraphParameters, MarketId, MarketKey, MarketParams, Side, Ticker,
};
use crate::engine::universe::Universe;
use crate::error::GraphError;

pub const DEFAULT_BOOK_DEPTH: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStats {
    pub bid_max_size: f64,
    pub ask_max_size: f64,
    pub bid_total_size: f64,
    pub ask_total_size: f64,
    pub price_precision: u32,
    pub size_precision: u32,
}

/// Aggregated view of one market's book plus both VWAP markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSnapshot {
    pub exchange: String,
    pub hub: String,
    pub market: String,
    pub bid_levels: Vec<AggregateLevel>,
    pub ask_levels: Vec<AggregateLevel>,
    pub buy_vwap: Option<f64>,
    pub sell_vwap: Option<f64>,
    pub stats: BookStats,
}

pub struct MarketGraph {
    universe: Universe,
    params: GraphParameters,
    limits: StrategyLimits,
    exchange_count: usize,
    ready: AHashSet<ExchangeId>,
    catalog_built: bool,
    arbs: Vec<Arbitrage>,
    arb_index: AHashMap<String, ArbId>,
    // (origin, destination) -> strategies, in catalog order
    pair_index: AHashMap<(MarketId, MarketId), SmallVec<[ArbId; 4]>>,
    book_depth: usize,
    book_subscriptions: AHashSet<MarketId>,
    spreads: EventChannel<SpreadExecution>,
    books: EventChannel<BookSnapshot>,
}

impl MarketGraph {
    /// Graph over the given exchanges. The readiness barrier waits for every
    /// distinct name in `exchanges`.
    pub fn new<S: AsRef<str>>(
        exchanges: &[S],
        params: GraphParameters,
        limits: StrategyLimits,
        book_depth: usize,
    ) -> Result<Self, GraphError> {
        validate_params(&params)?;
        if exchanges.is_empty() {
            return Err(GraphError::InvalidParameter { field: "exchanges", reason: "no exchanges configured".into() });
        }
        let mut universe = Universe::new();
        for name in exchanges {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(GraphError::UnknownExchange(String::new()));
            }
            universe.add_exchange(name);
        }
        let exchange_count = universe.exchanges().len();
        Ok(Self {
            universe,
            params,
            limits,
            exchange_count,
            ready: AHashSet::new(),
            catalog_built: false,
            arbs: Vec::new(),
            arb_index: AHashMap::new(),
            pair_index: AHashMap::new(),
            book_depth,
            book_subscriptions: AHashSet::new(),
            spreads: EventChannel::new(),
            books: EventChannel::new(),
        })
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn params(&self) -> &GraphParameters {
        &self.params
    }

    pub fn basis(&self) -> Option<AssetId> {
        self.universe.basis()
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_count
    }

    pub fn is_ready(&self) -> bool {
        self.catalog_built
    }

    fn exchange_id(&self, exchange: &str) -> Result<ExchangeId, GraphError> {
        self.universe.find_exchange(exchange).ok_or_else(|| GraphError::UnknownExchange(exchange.to_string()))
    }

    /// Register an exchange's `(hub, market)` listing. Malformed pairs are
    /// logged and skipped; returns how many pairs were accepted.
    #[instrument(level = "debug", skip(self, pairs), fields(pairs = pairs.len()))]
    pub fn map_symbols<H, M>(&mut self, exchange: &str, pairs: &[(H, M)]) -> Result<usize, GraphError>
    where
        H: AsRef<str>,
        M: AsRef<str>,
    {
        let ex = self.exchange_id(exchange)?;
        let mut accepted = 0;
        for (hub, market) in pairs {
            let (hub, market) = (hub.as_ref().trim(), market.as_ref().trim());
            if let Err(e) = check_symbols(exchange, hub, market) {
                warn!(error = %e, "Skipping symbol");
                continue;
            }
            let hub = self.universe.hub_for(ex, hub);
            self.universe.market_for(hub, market);
            accepted += 1;
        }
        self.map_basis();
        // late listings extend an already built catalog
        if self.catalog_built {
            self.find_arbs();
        }
        debug!(accepted, "Symbols mapped");
        Ok(accepted)
    }

    /// Resolve the basis asset from the configured symbol. The basis follows
    /// the symbol as soon as that asset is listed; until then the previous
    /// one stays in place. Once set it never goes back to unresolved.
    pub fn map_basis(&mut self) -> Option<AssetId> {
        let current = self.universe.basis();
        let Some(asset) = self.universe.find_asset(&self.params.basis_asset_symbol) else {
            if let Some(basis) = current {
                debug!(
                    resolved = self.universe.asset(basis).symbol(),
                    configured = %self.params.basis_asset_symbol,
                    "Configured basis not listed yet"
                );
            }
            return current;
        };
        if current != Some(asset) {
            self.universe.set_basis(asset);
            info!(
                basis = %self.params.basis_asset_symbol,
                previous = ?current.map(|b| self.universe.asset(b).symbol()),
                "Basis asset resolved"
            );
        }
        Some(asset)
    }

    /// Mark `exchange` ready. The call that completes the barrier builds the
    /// arbitrage catalog and returns `true`; repeats are ignored.
    #[instrument(level = "debug", skip(self))]
    pub fn exchange_ready(&mut self, exchange: &str) -> Result<bool, GraphError> {
        let ex = self.exchange_id(exchange)?;
        if !self.ready.insert(ex) {
            debug!("Exchange already reported ready");
            return Ok(false);
        }
        info!(ready = self.ready.len(), total = self.exchange_count, "Exchange ready");
        if self.catalog_built || self.ready.len() < self.exchange_count {
            return Ok(false);
        }
        self.catalog_built = true;
        self.find_arbs();
        Ok(true)
    }

    /// Add every candidate route not yet in the catalog and subscribe its
    /// legs. Returns the number of new strategies.
    pub fn find_arbs(&mut self) -> usize {
        let mut added = 0;
        for route in candidate_routes(&self.universe) {
            if self.arb_index.contains_key(route.id()) {
                continue;
            }
            let id = ArbId(self.arbs.len());
            for leg in route.legs() {
                self.universe.market_mut(leg.market).subscribe(leg.ticker_side, id);
            }
            debug!(arb = route.id(), "Arbitrage registered");
            self.arb_index.insert(route.id().to_string(), id);
            self.pair_index.entry((route.origin(), route.destination())).or_default().push(id);
            self.arbs.push(Arbitrage::new(id, route, self.limits));
            added += 1;
        }
        metrics::gauge!("arbx_arbitrages").set(self.arbs.len() as f64);
        info!(added, total = self.arbs.len(), "Arbitrage catalog updated");
        added
    }

    /// Existing market for `key`, or a new one on a known exchange. A market
    /// first seen after the barrier joins the catalog right away.
    fn locate(&mut self, key: &MarketKey) -> Result<MarketId, GraphError> {
        if let Some(id) = self.universe.find_market(key) {
            return Ok(id);
        }
        let ex = self.exchange_id(&key.exchange)?;
        check_symbols(&key.exchange, &key.hub, &key.market)?;
        let hub = self.universe.hub_for(ex, &key.hub);
        let id = self.universe.market_for(hub, &key.market);
        debug!(market = %key, "Market discovered from data");
        self.map_basis();
        if self.catalog_built {
            self.find_arbs();
        }
        Ok(id)
    }

    /// Apply a ticker: update the market's statistics, run the strategies
    /// listening on it, and return the spreads they completed.
    #[instrument(level = "trace", skip_all, fields(market = %ticker.key()))]
    pub fn update_ticker(&mut self, ticker: &Ticker) -> Result<Vec<SpreadExecution>, GraphError> {
        let market = self.locate(&ticker.key())?;

        let Some(trade) = ticker.trade() else {
            let m = self.universe.market_mut(market);
            if let Some(ask) = ticker.best_ask.filter(|p| p.is_finite() && *p > 0.0) {
                m.stats_mut(Side::Buy).observe_price(ask);
            }
            if let Some(bid) = ticker.best_bid.filter(|p| p.is_finite() && *p > 0.0) {
                m.stats_mut(Side::Sell).observe_price(bid);
            }
            return Ok(Vec::new());
        };

        // window target at the pre-trade price
        let price = self.universe.market(market).vwap(trade.side).unwrap_or(trade.price);
        let target = self.universe.market_size(market, self.params.basis_size, price);
        self.universe.market_mut(market).stats_mut(trade.side).handle_trade(trade, target);

        let listeners: SmallVec<[ArbId; 4]> = self.universe.market(market).listeners(trade.side).into();
        let mut completed = Vec::new();
        for arb in listeners {
            let Some(strategy) = self.arbs.get_mut(arb.0) else { continue };
            for spread in strategy.handle_trade(market, &trade, &self.universe, &self.params) {
                self.report(&spread);
                completed.push(spread);
            }
        }
        Ok(completed)
    }

    fn report(&mut self, spread: &SpreadExecution) {
        metrics::counter!("arbx_spreads_total", "type" => spread.arb_type.as_str()).increment(1);
        if spread.meets_target(self.params.spread_target) {
            info!(
                id = %spread.id,
                spread = ?spread.spread,
                percent = ?spread.spread_percent,
                per_minute = spread.spreads_per_minute,
                "Spread above target"
            );
        } else {
            debug!(id = %spread.id, spread = ?spread.spread, percent = ?spread.spread_percent, "Spread");
        }
        self.spreads.publish(spread);
    }

    /// Apply one level update; subscribed markets publish a fresh snapshot.
    pub fn update_book(&mut self, key: &MarketKey, update: &BookLevelUpdate) -> Result<(), GraphError> {
        let market = self.locate(key)?;
        self.universe.market_mut(market).book_mut().update_level(update.side, update.price, update.size);
        if self.book_subscriptions.contains(&market) {
            let snapshot = self.snapshot(market);
            self.books.publish(&snapshot);
        }
        Ok(())
    }

    /// Replace the runtime parameters. Spreads already in flight keep their
    /// target; window sizing and new spreads follow the new basis.
    pub fn update_params(&mut self, params: GraphParameters) -> Result<(), GraphError> {
        validate_params(&params)?;
        info!(
            basis = %params.basis_asset_symbol,
            basis_size = params.basis_size,
            spread_target = params.spread_target,
            "Graph parameters updated"
        );
        self.params = params;
        self.map_basis();
        Ok(())
    }

    pub fn update_market_params(&mut self, params: &MarketParams) -> Result<(), GraphError> {
        for (field, value) in [("price_precision", params.price_precision), ("size_precision", params.size_precision)] {
            if value > MAX_PRECISION {
                return Err(GraphError::InvalidParameter {
                    field,
                    reason: format!("{value} decimals exceeds {MAX_PRECISION}"),
                });
            }
        }
        let market = self.universe.find_market(&params.key).ok_or_else(|| GraphError::UnknownMarket(params.key.clone()))?;
        let m = self.universe.market_mut(market);
        m.price_precision = params.price_precision;
        m.size_precision = params.size_precision;
        if self.book_subscriptions.contains(&market) {
            let snapshot = self.snapshot(market);
            self.books.publish(&snapshot);
        }
        Ok(())
    }

    /// Start publishing snapshots of `key` on every book change and return
    /// the current one.
    pub fn subscribe_to_book(&mut self, key: &MarketKey) -> Result<BookSnapshot, GraphError> {
        let market = self.locate(key)?;
        self.book_subscriptions.insert(market);
        Ok(self.snapshot(market))
    }

    pub fn unsubscribe_from_book(&mut self, key: &MarketKey) -> bool {
        self.universe.find_market(key).map_or(false, |m| self.book_subscriptions.remove(&m))
    }

    pub fn book_snapshot(&self, key: &MarketKey) -> Result<BookSnapshot, GraphError> {
        let market = self.universe.find_market(key).ok_or_else(|| GraphError::UnknownMarket(key.clone()))?;
        Ok(self.snapshot(market))
    }

    fn snapshot(&self, market: MarketId) -> BookSnapshot {
        let m = self.universe.market(market);
        let (buy_vwap, sell_vwap) = (m.vwap(Side::Buy), m.vwap(Side::Sell));
        // bids carry the sell-side marker, asks the buy-side one
        let book = m.book().aggregate(self.book_depth, m.price_precision, sell_vwap, buy_vwap);
        BookSnapshot {
            exchange: m.exchange_name().to_string(),
            hub: m.hub_symbol().to_string(),
            market: m.symbol().to_string(),
            stats: BookStats {
                bid_max_size: book.bids.max_size,
                ask_max_size: book.asks.max_size,
                bid_total_size: book.bids.total_size,
                ask_total_size: book.asks.total_size,
                price_precision: m.price_precision,
                size_precision: m.size_precision,
            },
            bid_levels: book.bids.levels,
            ask_levels: book.asks.levels,
            buy_vwap,
            sell_vwap,
        }
    }

    pub fn get_market(&self, key: &MarketKey) -> Option<&Market> {
        self.universe.find_market(key).map(|id| self.universe.market(id))
    }

    pub fn on_spread<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SpreadExecution) + Send + 'static,
    {
        self.spreads.subscribe(listener)
    }

    pub fn off_spread(&mut self, id: SubscriptionId) -> bool {
        self.spreads.unsubscribe(id)
    }

    pub fn on_book<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&BookSnapshot) + Send + 'static,
    {
        self.books.subscribe(listener)
    }

    pub fn off_book(&mut self, id: SubscriptionId) -> bool {
        self.books.unsubscribe(id)
    }

    pub fn arbitrage(&self, id: &str) -> Option<&Arbitrage> {
        self.arb_index.get(id).map(|arb| &self.arbs[arb.0])
    }

    pub fn arbitrages(&self) -> &[Arbitrage] {
        &self.arbs
    }

    /// Listen to one strategy's completed spreads. `None` for an unknown id.
    pub fn subscribe_to_arbitrage<F>(&mut self, id: &str, listener: F) -> Option<SubscriptionId>
    where
        F: FnMut(&SpreadExecution) + Send + 'static,
    {
        let arb = *self.arb_index.get(id)?;
        Some(self.arbs[arb.0].subscribe(listener))
    }

    pub fn unsubscribe_from_arbitrage(&mut self, id: &str, subscription: SubscriptionId) -> bool {
        match self.arb_index.get(id) {
            Some(arb) => self.arbs[arb.0].unsubscribe(subscription),
            None => false,
        }
    }

    /// The route to act on for an (origin, destination) pair: direct when
    /// available, else the conversion route whose last spread was smallest
    /// in magnitude. Routes without a spread yet rank last.
    pub fn preferred_route(
        &self,
        origin: &MarketKey,
        destination: &MarketKey,
        initiation: Initiation,
    ) -> Option<&Arbitrage> {
        let origin = self.universe.find_market(origin)?;
        let destination = self.universe.find_market(destination)?;
        let ids = self.pair_index.get(&(origin, destination))?;
        let candidates = || {
            ids.iter()
                .map(|id| &self.arbs[id.0])
                .filter(move |a| a.route().arb_type().initiation == initiation)
        };
        if let Some(direct) = candidates().find(|a| a.route().arb_type().kind == RouteKind::Direct) {
            return Some(direct);
        }
        candidates().min_by_key(|a| match a.last_spread().and_then(|s| s.spread) {
            Some(spread) => (false, OrderedFloat(spread.abs())),
            None => (true, OrderedFloat(0.0)),
        })
    }
}

fn validate_params(params: &GraphParameters) -> Result<(), GraphError> {
    if params.basis_asset_symbol.trim().is_empty() {
        return Err(GraphError::InvalidParameter { field: "basis_asset_symbol", reason: "empty symbol".into() });
    }
    if !(params.basis_size.is_finite() && params.basis_size > 0.0) {
        return Err(GraphError::InvalidParameter {
            field: "basis_size",
            reason: format!("{} is not a positive size", params.basis_size),
        });
    }
    if !params.spread_target.is_finite() {
        return Err(GraphError::InvalidParameter { field: "spread_target", reason: "not a finite number".into() });
    }
    Ok(())
}

fn check_symbols(exchange: &str, hub: &str, market: &str) -> Result<(), GraphError> {
    if hub.is_empty() || market.is_empty() || hub == market {
        return Err(GraphError::MalformedSymbol {
            exchange: exchange.to_string(),
            hub: hub.to_string(),
            market: market.to_string(),
        });
    }
    Ok(())
}
