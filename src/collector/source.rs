//! Data source contract
//!
//! Every provider (exchange REST API, aggregator, social feed) implements
//! [`DataSource`]. The collector only ever sees this trait, so adding a
//! provider never touches the collector.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::{MarketSnapshot, TokenInfo};
use crate::error::Result;

/// One external data provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable provider name used in logs
    fn name(&self) -> &str;

    /// Basic token identity and supply facts
    async fn collect_token_info(&self, symbol: &str) -> Result<TokenInfo>;

    /// Current price/volume snapshot
    async fn collect_market_data(&self, symbol: &str) -> Result<MarketSnapshot>;

    /// Platform -> score map. Providers report disjoint platform keys; an
    /// empty map means the provider has nothing for this symbol.
    async fn collect_social_metrics(&self, symbol: &str) -> Result<HashMap<String, f64>>;
}
