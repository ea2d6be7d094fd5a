use std::sync::Arc;

use arbx_rs::arbitrage::{Initiation, RouteKind, SpreadExecution, StrategyLimits};
use arbx_rs::engine::types::{BookLevelUpdate, GraphParameters, MarketKey, Side, Ticker};
use arbx_rs::MarketGraph;
use parking_lot::Mutex;

fn ticker(exchange: &str, hub: &str, market: &str, side: Side, price: f64, size: f64, time: u64) -> Ticker {
    Ticker {
        exchange_symbol: exchange.into(),
        hub_symbol: hub.into(),
        market_symbol: market.into(),
        time,
        price: Some(price),
        size: Some(size),
        side: Some(side),
        best_bid: None,
        best_ask: None,
    }
}

fn ready_graph(listings: &[(&str, &[(&str, &str)])]) -> MarketGraph {
    let exchanges: Vec<&str> = listings.iter().map(|(e, _)| *e).collect();
    let mut graph =
        MarketGraph::new(&exchanges, GraphParameters::default(), StrategyLimits::default(), 20).unwrap();
    for (exchange, pairs) in listings {
        graph.map_symbols(exchange, *pairs).unwrap();
    }
    for exchange in &exchanges {
        graph.exchange_ready(exchange).unwrap();
    }
    assert!(graph.is_ready());
    graph
}

fn catalog(graph: &MarketGraph) -> Vec<String> {
    let mut ids: Vec<String> = graph.arbitrages().iter().map(|a| a.route().id().to_string()).collect();
    ids.sort();
    ids
}

#[test]
fn same_hub_on_two_venues_yields_direct_routes_only() {
    let graph = ready_graph(&[("a", &[("BTC", "ETH")]), ("b", &[("BTC", "ETH")])]);
    assert_eq!(
        catalog(&graph),
        vec![
            "M:direct:a.BTC.ETH>b.BTC.ETH",
            "M:direct:b.BTC.ETH>a.BTC.ETH",
            "T:direct:a.BTC.ETH>b.BTC.ETH",
            "T:direct:b.BTC.ETH>a.BTC.ETH",
        ]
    );
    assert!(graph.arbitrages().iter().all(|a| a.route().arb_type().kind == RouteKind::Direct));
}

#[test]
fn conversion_market_on_destination_yields_destination_routes() {
    let graph = ready_graph(&[("a", &[("USDT", "ETH")]), ("b", &[("BTC", "ETH"), ("USDT", "BTC")])]);
    let types: Vec<String> = graph
        .arbitrages()
        .iter()
        .filter(|a| a.route().id().contains(":a.USDT.ETH>b.BTC.ETH"))
        .map(|a| a.route().arb_type().to_string())
        .collect();
    assert_eq!(types, vec!["MakerDestinationConversion", "TakerDestinationConversion"]);
    assert!(graph.arbitrage("T:destination:a.USDT.ETH>b.BTC.ETH~b.USDT.BTC").is_some());
    // the reverse direction converts on its origin venue instead
    assert!(graph.arbitrage("T:origin:b.BTC.ETH>a.USDT.ETH~b.USDT.BTC").is_some());
}

#[test]
fn destination_conversion_spread_end_to_end() {
    let mut graph = ready_graph(&[("a", &[("USDT", "ETH")]), ("b", &[("BTC", "ETH"), ("USDT", "BTC")])]);
    let id = "T:destination:a.USDT.ETH>b.BTC.ETH~b.USDT.BTC";
    let seen = Arc::new(Mutex::new(Vec::<SpreadExecution>::new()));
    let sink = Arc::clone(&seen);
    graph.subscribe_to_arbitrage(id, move |s: &SpreadExecution| sink.lock().push(s.clone())).unwrap();

    // price the conversion market first: 1 BTC = 20000 USDT
    graph.update_ticker(&ticker("b", "USDT", "BTC", Side::Buy, 20_000.0, 1.0, 0)).unwrap();
    // buy 0.2 ETH for 200 USDT (= 0.01 BTC) on a
    graph.update_ticker(&ticker("a", "USDT", "ETH", Side::Buy, 1_000.0, 0.2, 1)).unwrap();
    // sell it for 0.0102 BTC on b
    graph.update_ticker(&ticker("b", "BTC", "ETH", Side::Sell, 0.051, 0.2, 2)).unwrap();
    assert!(seen.lock().is_empty());
    // and sell the BTC back into USDT
    let done = graph.update_ticker(&ticker("b", "USDT", "BTC", Side::Sell, 20_000.0, 0.05, 3)).unwrap();

    let ours: Vec<&SpreadExecution> = done.iter().filter(|s| s.id.starts_with(id)).collect();
    assert_eq!(ours.len(), 1);
    let spread = ours[0];
    assert_eq!(spread.arb_type.as_str(), "TakerDestinationConversion");
    assert!((spread.spread.unwrap() - 0.0002).abs() < 1e-12);
    assert!((spread.spread_percent.unwrap() - 0.02).abs() < 1e-9);
    assert!((spread.hub_spread.unwrap() - 4.0).abs() < 1e-9);
    let convert = spread.convert.as_ref().unwrap();
    assert!(convert.filled);
    assert!((convert.size - 0.0102).abs() < 1e-12);
    assert_eq!(seen.lock().len(), 1);

    let json = serde_json::to_value(spread).unwrap();
    assert_eq!(json["type"], "TakerDestinationConversion");
    assert_eq!(json["convert"]["market"], "BTC");
}

#[test]
fn rolling_window_counts_spreads_in_the_last_minute() {
    let mut graph = ready_graph(&[("a", &[("BTC", "ETH")]), ("b", &[("BTC", "ETH")])]);
    let id = "T:direct:a.BTC.ETH>b.BTC.ETH";
    let mut per_minute = Vec::new();
    for time in [0, 30_000, 61_000] {
        graph.update_ticker(&ticker("a", "BTC", "ETH", Side::Buy, 0.05, 0.2, time)).unwrap();
        let done = graph.update_ticker(&ticker("b", "BTC", "ETH", Side::Sell, 0.051, 0.2, time)).unwrap();
        let spread = done.iter().find(|s| s.id.starts_with(id)).unwrap();
        per_minute.push(spread.spreads_per_minute);
    }
    assert_eq!(per_minute, vec![1, 2, 2]);
    assert_eq!(graph.arbitrage(id).unwrap().spreads_per_minute(), 2);
}

#[test]
fn parameter_update_only_affects_new_spreads() {
    let mut graph = ready_graph(&[("a", &[("BTC", "ETH")]), ("b", &[("BTC", "ETH")])]);
    let id = "T:direct:a.BTC.ETH>b.BTC.ETH";
    // half of the 0.01 BTC entry
    graph.update_ticker(&ticker("a", "BTC", "ETH", Side::Buy, 0.05, 0.1, 1)).unwrap();
    graph.update_params(GraphParameters { basis_size: 0.02, ..Default::default() }).unwrap();
    graph.update_ticker(&ticker("a", "BTC", "ETH", Side::Buy, 0.05, 0.3, 2)).unwrap();

    let targets: Vec<f64> = graph.arbitrage(id).unwrap().in_flight().map(|s| s.target_basis_size).collect();
    assert_eq!(targets, vec![0.01, 0.02]);
}

#[test]
fn book_snapshot_is_sorted_and_cumulative() {
    let mut graph = ready_graph(&[("a", &[("USDT", "ETH")])]);
    let key = MarketKey::new("a", "USDT", "ETH");
    for (side, price, size) in [
        (Side::Buy, 99.0, 1.0),
        (Side::Buy, 98.5, 2.0),
        (Side::Buy, 99.0, 3.0),
        (Side::Sell, 101.0, 1.5),
        (Side::Sell, 100.5, 0.5),
        (Side::Sell, 103.0, 4.0),
    ] {
        graph.update_book(&key, &BookLevelUpdate { side, price, size }).unwrap();
    }
    let snapshot = graph.subscribe_to_book(&key).unwrap();

    assert!(snapshot.bid_levels.windows(2).all(|w| w[0].price > w[1].price));
    assert!(snapshot.ask_levels.windows(2).all(|w| w[0].price < w[1].price));
    // overwritten, not accumulated
    assert_eq!(snapshot.bid_levels[0].size, 3.0);
    let bid_sum: f64 = snapshot.bid_levels.iter().map(|l| l.size).sum();
    assert_eq!(snapshot.bid_levels.last().unwrap().aggregate, bid_sum);
    assert_eq!(snapshot.stats.bid_total_size, 5.0);
    assert_eq!(snapshot.stats.ask_max_size, 4.0);
    assert_eq!(snapshot.ask_levels[0].price, 100.5);
}

#[test]
fn preferred_route_picks_direct_when_available() {
    let graph = ready_graph(&[("a", &[("BTC", "ETH")]), ("b", &[("BTC", "ETH")])]);
    let chosen = graph
        .preferred_route(&MarketKey::new("b", "BTC", "ETH"), &MarketKey::new("a", "BTC", "ETH"), Initiation::Maker)
        .unwrap();
    assert_eq!(chosen.route().id(), "M:direct:b.BTC.ETH>a.BTC.ETH");
}

// Both venues list the USDT/BTC pair, so either side can convert.
fn two_sided_conversion_graph() -> MarketGraph {
    ready_graph(&[("a", &[("USDT", "ETH"), ("BTC", "USDT")]), ("b", &[("BTC", "ETH"), ("USDT", "BTC")])])
}

#[test]
fn conversion_on_both_venues_yields_both_route_kinds() {
    let graph = two_sided_conversion_graph();
    let mut types: Vec<String> = graph
        .arbitrages()
        .iter()
        .filter(|a| a.route().id().contains(":a.USDT.ETH>b.BTC.ETH~"))
        .map(|a| a.route().arb_type().to_string())
        .collect();
    types.sort();
    assert_eq!(
        types,
        vec![
            "MakerDestinationConversion",
            "MakerOriginConversion",
            "TakerDestinationConversion",
            "TakerOriginConversion",
        ]
    );
    assert!(graph.arbitrage("T:origin:a.USDT.ETH>b.BTC.ETH~a.BTC.USDT").is_some());
    assert!(graph.arbitrage("T:destination:a.USDT.ETH>b.BTC.ETH~b.USDT.BTC").is_some());
    // and the same for the reverse direction
    assert_eq!(graph.arbitrages().len(), 8);
}

#[test]
fn preferred_route_ranks_conversions_by_spread_magnitude() {
    let mut graph = two_sided_conversion_graph();
    let origin = MarketKey::new("a", "USDT", "ETH");
    let destination = MarketKey::new("b", "BTC", "ETH");
    let via_origin = "T:origin:a.USDT.ETH>b.BTC.ETH~a.BTC.USDT";
    let via_destination = "T:destination:a.USDT.ETH>b.BTC.ETH~b.USDT.BTC";
    let preferred = |graph: &MarketGraph| {
        graph.preferred_route(&origin, &destination, Initiation::Taker).unwrap().route().id().to_string()
    };
    let last_spread = |graph: &MarketGraph, id: &str| graph.arbitrage(id).unwrap().last_spread().unwrap().spread.unwrap();

    // 1 BTC = 20000 USDT on both venues
    graph.update_ticker(&ticker("b", "USDT", "BTC", Side::Buy, 20_000.0, 1.0, 0)).unwrap();
    graph.update_ticker(&ticker("a", "BTC", "USDT", Side::Sell, 0.00005, 1_000.0, 0)).unwrap();
    // both routes buy 0.2 ETH for 200 USDT on a and sell it for 0.0102 BTC on b
    graph.update_ticker(&ticker("a", "USDT", "ETH", Side::Buy, 1_000.0, 0.2, 1)).unwrap();
    graph.update_ticker(&ticker("b", "BTC", "ETH", Side::Sell, 0.051, 0.2, 2)).unwrap();
    assert_eq!(preferred(&graph), via_origin);

    // origin conversion pays 0.0105 BTC for the 200 USDT
    graph.update_ticker(&ticker("a", "BTC", "USDT", Side::Buy, 0.0000525, 1_000.0, 3)).unwrap();
    assert!((last_spread(&graph, via_origin) + 0.0003).abs() < 1e-9);
    assert!(graph.arbitrage(via_destination).unwrap().last_spread().is_none());
    assert_eq!(preferred(&graph), via_origin);

    // destination conversion gets 204 USDT back, valued at the a.BTC.USDT mid
    graph.update_ticker(&ticker("b", "USDT", "BTC", Side::Sell, 20_000.0, 0.05, 4)).unwrap();
    assert!((last_spread(&graph, via_destination) + 0.00005).abs() < 1e-9);
    // the smaller loss wins even though the other spread is numerically lower
    assert_eq!(preferred(&graph), via_destination);
}
