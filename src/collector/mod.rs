//! Data collection module
//!
//! Aggregates independent market-data providers behind one collector with
//! fallback, fan-out/merge and periodic subscription semantics.

mod binance;
mod multi_source;
mod source;
mod subscription;

pub use binance::BinanceDataSource;
pub use multi_source::MultiSourceCollector;
pub use source::DataSource;
pub use subscription::{MarketDataSubscription, SUBSCRIPTION_BUFFER};
