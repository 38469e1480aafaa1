//! Multi-source collector
//!
//! Single-valued queries (token info, market data) walk the sources in
//! registration order and return the first success. Social metrics are
//! partitioned across platforms, so every source is queried concurrently
//! and the partial maps are merged.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::source::DataSource;
use super::subscription::{poll_source, MarketDataSubscription, SUBSCRIPTION_BUFFER};
use crate::coordination::ShutdownToken;
use crate::domain::{MarketSnapshot, TokenInfo};
use crate::error::{FluxError, Result};

/// Aggregates a fixed, ordered set of data sources
pub struct MultiSourceCollector {
    sources: Vec<Arc<dyn DataSource>>,
    channel_capacity: usize,
}

impl MultiSourceCollector {
    /// Create a collector; source order is the fallback priority
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self {
            sources,
            channel_capacity: SUBSCRIPTION_BUFFER,
        }
    }

    /// Override the subscription channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Registered source names, in priority order
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// First successful token info across sources
    pub async fn collect_token_info(&self, symbol: &str) -> Result<TokenInfo> {
        for source in &self.sources {
            match source.collect_token_info(symbol).await {
                Ok(info) => {
                    info!(source = source.name(), %symbol, "collected token info");
                    return Ok(info);
                }
                Err(e) => {
                    warn!(source = source.name(), %symbol, error = %e, "failed to collect token info");
                }
            }
        }

        Err(FluxError::NotFound(format!(
            "token info for {} unavailable from all {} sources",
            symbol,
            self.sources.len()
        )))
    }

    /// First successful market snapshot across sources
    pub async fn collect_market_data(&self, symbol: &str) -> Result<MarketSnapshot> {
        for source in &self.sources {
            match source.collect_market_data(symbol).await {
                Ok(snapshot) => {
                    debug!(source = source.name(), %symbol, price = snapshot.price, "collected market data");
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!(source = source.name(), %symbol, error = %e, "failed to collect market data");
                }
            }
        }

        Err(FluxError::NotFound(format!(
            "market data for {} unavailable from all {} sources",
            symbol,
            self.sources.len()
        )))
    }

    /// Query every source concurrently and merge their platform scores.
    ///
    /// Waits for all sources; a failing source is logged and left out of
    /// the merge. On key collision the later writer wins.
    pub async fn collect_social_metrics(&self, symbol: &str) -> Result<HashMap<String, f64>> {
        let merged: Arc<Mutex<HashMap<String, f64>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut tasks = JoinSet::new();

        for source in &self.sources {
            let source = Arc::clone(source);
            let merged = Arc::clone(&merged);
            let symbol = symbol.to_string();

            tasks.spawn(async move {
                match source.collect_social_metrics(&symbol).await {
                    Ok(metrics) => {
                        let platforms = metrics.len();
                        merged.lock().await.extend(metrics);
                        info!(source = source.name(), %symbol, platforms, "collected social metrics");
                    }
                    Err(e) => {
                        warn!(source = source.name(), %symbol, error = %e, "failed to collect social metrics");
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(%symbol, error = %e, "social metrics task panicked");
            }
        }

        let results = std::mem::take(&mut *merged.lock().await);
        if results.is_empty() {
            return Err(FluxError::NotFound(format!(
                "social metrics for {} unavailable from all sources",
                symbol
            )));
        }

        Ok(results)
    }

    /// Start one poller per source and return the shared stream.
    ///
    /// Every poller ticks at `interval`, fetches each symbol and publishes
    /// without blocking. The stream ends after `shutdown` fires and all
    /// pollers have exited.
    pub fn subscribe_to_market_data(
        &self,
        symbols: &[String],
        interval: Duration,
        shutdown: ShutdownToken,
    ) -> Result<MarketDataSubscription> {
        if interval.is_zero() {
            return Err(FluxError::InvalidParameter(
                "refresh interval must be greater than zero".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let symbols: Arc<[String]> = symbols.to_vec().into();

        let producers = self
            .sources
            .iter()
            .map(|source| {
                tokio::spawn(poll_source(
                    Arc::clone(source),
                    Arc::clone(&symbols),
                    interval,
                    tx.clone(),
                    Arc::clone(&dropped),
                    shutdown.clone(),
                ))
            })
            .collect();

        // Only the pollers hold senders from here on
        drop(tx);

        info!(
            sources = self.sources.len(),
            symbols = symbols.len(),
            "subscribed to market data"
        );

        Ok(MarketDataSubscription::new(rx, dropped, producers))
    }
}
