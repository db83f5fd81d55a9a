//! Data layer: retrieval, storage, and the collection orchestrator.

pub mod circuit_breaker;
pub mod collector;
pub mod config;
pub mod provider;
pub mod store;
pub mod tiingo;

pub use circuit_breaker::CircuitBreaker;
pub use collector::{CollectSummary, Collector, DeleteSummary};
pub use config::CollectorConfig;
pub use provider::{
    CollectProgress, DataError, EodProvider, EodRow, FetchResult, SilentProgress, StdoutProgress,
};
pub use store::{CoverageRecord, EodStore, StoreStatus};
pub use tiingo::TiingoProvider;
