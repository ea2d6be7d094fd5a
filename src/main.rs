use std::path::PathBuf;

use anyhow::Context;
use arbx_rs::config::Settings;
use arbx_rs::market_data::adapters::replay::ReplayAdapter;
use arbx_rs::market_data::adapters::VenueAdapter;
use arbx_rs::market_data::router;
use arbx_rs::{telemetry, MarketGraph, SpreadExecution};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Replay recorded market events through the arbitrage graph and print every
/// completed spread as a JSON line.
#[derive(Parser, Debug)]
#[command(name = "arbx", version, about)]
struct Args {
    /// TOML settings file (defaults to config/arbx.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines event file; overrides replay.path
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Tracing filter; overrides logging.filter (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    telemetry::init_tracing(args.log_filter.as_deref().unwrap_or(&settings.logging.filter))?;
    telemetry::init_metrics(settings.metrics.port)?;

    let path = args
        .events
        .or_else(|| settings.replay.path.clone())
        .context("no event file: pass --events or set replay.path")?;

    let mut graph = MarketGraph::new(
        &settings.exchanges,
        settings.graph_params(),
        settings.limits(),
        settings.book.depth,
    )?;
    graph.on_spread(|spread: &SpreadExecution| match serde_json::to_string(spread) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(id = %spread.id, error = %e, "Failed to encode spread"),
    });

    let (tx, rx) = mpsc::channel(settings.replay.channel_capacity);
    let adapter = ReplayAdapter::new("replay", path);
    let feed = tokio::spawn(async move { adapter.spawn(tx).await });

    let stats = router::run(&mut graph, rx).await;
    feed.await??;

    info!(
        events = stats.events,
        dropped = stats.dropped,
        spreads = stats.spreads,
        arbitrages = graph.arbitrages().len(),
        "Replay complete"
    );
    Ok(())
}
