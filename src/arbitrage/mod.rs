// Route classification and the spread-execution state machine
pub mod execution;
pub mod route;
pub mod strategy;

pub use execution::{ExecutionOperation, SpreadExecution};
pub use route::{ArbitrageType, Initiation, LegRole, Route, RouteKind};
pub use strategy::{Arbitrage, StrategyLimits};
