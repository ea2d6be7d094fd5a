// Market graph core: entities, statistics, books, and the graph itself
pub mod asset;
pub mod book;
pub mod channel;
mod conversion; // basis-size conversion helpers on Universe
pub mod exchange;
pub mod graph;
pub mod market;
pub mod stats;
pub mod types;
pub mod universe;
