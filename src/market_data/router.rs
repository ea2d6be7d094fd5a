// Router drains adapter events into the graph, one event at a time
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::arbitrage::SpreadExecution;
use crate::engine::graph::MarketGraph;
use crate::error::GraphError;
use crate::market_data::adapters::MarketEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub events: u64,
    pub dropped: u64,
    pub spreads: u64,
}

/// Apply one event to the graph, returning any spreads it completed.
pub fn dispatch(graph: &mut MarketGraph, event: MarketEvent) -> Result<Vec<SpreadExecution>, GraphError> {
    match event {
        MarketEvent::Symbols { exchange, pairs } => {
            graph.map_symbols(&exchange, &pairs)?;
            Ok(Vec::new())
        }
        MarketEvent::Ticker(ticker) => graph.update_ticker(&ticker),
        MarketEvent::Book(book) => {
            graph.update_book(&book.key(), &book.level())?;
            Ok(Vec::new())
        }
        MarketEvent::Ready { exchange } => {
            if graph.exchange_ready(&exchange)? {
                info!(arbitrages = graph.arbitrages().len(), "All exchanges ready");
            }
            Ok(Vec::new())
        }
        MarketEvent::Params(params) => {
            graph.update_params(params)?;
            Ok(Vec::new())
        }
        MarketEvent::MarketParams(params) => {
            graph.update_market_params(&params)?;
            Ok(Vec::new())
        }
    }
}

/// Process events until every sender is dropped. Events the graph rejects
/// are logged and dropped; the loop keeps going.
pub async fn run(graph: &mut MarketGraph, mut rx: mpsc::Receiver<MarketEvent>) -> RouterStats {
    let mut stats = RouterStats::default();
    while let Some(event) = rx.recv().await {
        stats.events += 1;
        match dispatch(graph, event) {
            Ok(spreads) => stats.spreads += spreads.len() as u64,
            Err(e) => {
                warn!(error = %e, "Dropping event");
                metrics::counter!("arbx_events_dropped_total").increment(1);
                stats.dropped += 1;
            }
        }
    }
    debug!(?stats, "Event stream closed");
    stats
}
