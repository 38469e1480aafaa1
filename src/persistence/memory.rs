use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::DataStorage;
use crate::domain::{MarketSnapshot, ProjectMetrics, TokenInfo};
use crate::error::{FluxError, Result};

/// Process-local storage; contents are lost on exit
#[derive(Default)]
pub struct MemoryStorage {
    tokens: DashMap<String, TokenInfo>,
    snapshots: DashMap<String, Vec<MarketSnapshot>>,
    metrics: DashMap<String, ProjectMetrics>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_count(&self, symbol: &str) -> usize {
        self.snapshots.get(symbol).map(|s| s.len()).unwrap_or(0)
    }

    pub fn token_info(&self, symbol: &str) -> Option<TokenInfo> {
        self.tokens.get(symbol).map(|t| t.clone())
    }
}

#[async_trait]
impl DataStorage for MemoryStorage {
    async fn save_token_info(&self, info: &TokenInfo) -> Result<()> {
        self.tokens.insert(info.symbol.clone(), info.clone());
        Ok(())
    }

    async fn save_market_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()> {
        self.snapshots
            .entry(snapshot.symbol.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn get_historical_data(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketSnapshot>> {
        let mut result: Vec<MarketSnapshot> = self
            .snapshots
            .get(symbol)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        result.sort_by_key(|s| s.timestamp);
        Ok(result)
    }

    async fn save_project_metrics(&self, metrics: &ProjectMetrics) -> Result<()> {
        let symbol = metrics.token_info.symbol.clone();
        let newer = self
            .metrics
            .get(&symbol)
            .map(|existing| metrics.updated_at >= existing.updated_at)
            .unwrap_or(true);

        if newer {
            self.metrics.insert(symbol, metrics.clone());
        }
        Ok(())
    }

    async fn get_project_metrics(&self, symbol: &str) -> Result<ProjectMetrics> {
        self.metrics
            .get(symbol)
            .map(|m| m.clone())
            .ok_or_else(|| FluxError::NotFound(format!("no metrics found for symbol: {}", symbol)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot_at(symbol: &str, price: f64, at: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            timestamp: at,
            ..MarketSnapshot::new(symbol, price)
        }
    }

    #[tokio::test]
    async fn test_historical_range_is_ordered_and_inclusive() {
        let storage = MemoryStorage::new();
        let t0 = Utc::now();

        storage.save_market_snapshot(&snapshot_at("BTC", 3.0, t0 + Duration::minutes(2))).await.unwrap();
        storage.save_market_snapshot(&snapshot_at("BTC", 1.0, t0)).await.unwrap();
        storage.save_market_snapshot(&snapshot_at("BTC", 2.0, t0 + Duration::minutes(1))).await.unwrap();
        storage.save_market_snapshot(&snapshot_at("BTC", 9.0, t0 + Duration::minutes(5))).await.unwrap();
        storage.save_market_snapshot(&snapshot_at("ETH", 7.0, t0)).await.unwrap();

        let history = storage
            .get_historical_data("BTC", t0, t0 + Duration::minutes(2))
            .await
            .unwrap();
        let prices: Vec<f64> = history.iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_token_info_upsert() {
        let storage = MemoryStorage::new();
        storage.save_token_info(&TokenInfo::new("PEPE", "Pepe")).await.unwrap();
        storage.save_token_info(&TokenInfo::new("PEPE", "Pepe Coin")).await.unwrap();

        assert_eq!(storage.token_info("PEPE").unwrap().name, "Pepe Coin");
    }

    #[tokio::test]
    async fn test_project_metrics_latest_wins() {
        let storage = MemoryStorage::new();
        assert!(storage.get_project_metrics("BTC").await.unwrap_err().is_not_found());

        let mut old = ProjectMetrics::from_social_score(TokenInfo::new("BTC", "Bitcoin"), 10.0);
        old.updated_at = Utc::now() - Duration::hours(1);
        let new = ProjectMetrics::from_social_score(TokenInfo::new("BTC", "Bitcoin"), 20.0);

        storage.save_project_metrics(&new).await.unwrap();
        storage.save_project_metrics(&old).await.unwrap();

        assert_eq!(storage.get_project_metrics("BTC").await.unwrap().social_score, 20.0);
    }
}
