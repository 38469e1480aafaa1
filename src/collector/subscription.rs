//! Periodic market-data subscription
//!
//! One polling task per source publishes into a single bounded channel.
//! Publishing never blocks: a full channel drops the snapshot and bumps a
//! shared counter. Each poller owns a `Sender` clone, so the receiver only
//! observes closure once every poller has returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::source::DataSource;
use crate::coordination::ShutdownToken;
use crate::domain::MarketSnapshot;

/// Default capacity of the shared snapshot channel
pub const SUBSCRIPTION_BUFFER: usize = 100;

/// Live subscription handle returned by the collector
#[derive(Debug)]
pub struct MarketDataSubscription {
    rx: mpsc::Receiver<MarketSnapshot>,
    dropped: Arc<AtomicU64>,
    producers: Vec<JoinHandle<()>>,
}

impl MarketDataSubscription {
    pub(crate) fn new(
        rx: mpsc::Receiver<MarketSnapshot>,
        dropped: Arc<AtomicU64>,
        producers: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            rx,
            dropped,
            producers,
        }
    }

    /// Next snapshot; `None` once every poller has exited.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<MarketSnapshot> {
        self.rx.recv().await
    }

    /// Snapshot without waiting, if one is buffered
    pub fn try_recv(&mut self) -> Option<MarketSnapshot> {
        self.rx.try_recv().ok()
    }

    /// Snapshots dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of pollers still tracked
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Split into the raw receiver, drop counter and poller handles
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<MarketSnapshot>,
        Arc<AtomicU64>,
        Vec<JoinHandle<()>>,
    ) {
        (self.rx, self.dropped, self.producers)
    }

    /// Wait for every poller to exit (call after requesting shutdown)
    pub async fn join(&mut self) {
        for handle in self.producers.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "market data poller panicked");
            }
        }
    }
}

/// Poll one source for every symbol on each tick until shutdown.
///
/// The first tick fires one full `interval` after start. Shutdown is
/// observed between ticks; an in-flight fetch always completes first.
pub(crate) async fn poll_source(
    source: Arc<dyn DataSource>,
    symbols: Arc<[String]>,
    interval: Duration,
    tx: mpsc::Sender<MarketSnapshot>,
    dropped: Arc<AtomicU64>,
    mut shutdown: ShutdownToken,
) {
    let source_name = source.name().to_string();
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        source = %source_name,
        symbols = symbols.len(),
        interval_ms = interval.as_millis() as u64,
        "market data poller started"
    );

    loop {
        // Shutdown first: once a fetch returns, a pending stop wins over a late tick
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!(source = %source_name, "market data poller received shutdown signal");
                break;
            }

            _ = ticker.tick() => {
                for symbol in symbols.iter() {
                    let snapshot = match source.collect_market_data(symbol).await {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            warn!(source = %source_name, %symbol, error = %e, "failed to collect market data");
                            continue;
                        }
                    };

                    match tx.try_send(snapshot) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                            warn!(source = %source_name, %symbol, dropped_total = total, "channel full, dropping market data");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!(source = %source_name, "subscriber gone, stopping poller");
                            return;
                        }
                    }
                }
            }
        }
    }

    info!(source = %source_name, "market data poller stopped");
}
