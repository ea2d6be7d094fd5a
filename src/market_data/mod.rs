// Market data module entrypoint
pub mod adapters; // venue adapters feeding the router (file replay)
pub mod router; // drains adapter events into the graph
