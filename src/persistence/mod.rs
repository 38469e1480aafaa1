//! Persistence layer
//!
//! Market snapshots, token identity and project metrics behind the
//! [`DataStorage`] trait:
//! - In-memory store for dry runs and tests
//! - PostgreSQL store against an existing schema

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{MarketSnapshot, ProjectMetrics, TokenInfo};
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataStorage: Send + Sync {
    /// Insert or replace the token keyed by symbol
    async fn save_token_info(&self, info: &TokenInfo) -> Result<()>;

    async fn save_market_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()>;

    /// Snapshots with `start <= timestamp <= end`, oldest first
    async fn get_historical_data(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketSnapshot>>;

    async fn save_project_metrics(&self, metrics: &ProjectMetrics) -> Result<()>;

    /// Latest metrics for the symbol; `NotFound` if none were stored
    async fn get_project_metrics(&self, symbol: &str) -> Result<ProjectMetrics>;
}
