//! Top-level dispatch loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::pipeline::{Pipeline, PipelineOutcome, PipelineSettings};
use crate::ai::Analyzer;
use crate::collector::MultiSourceCollector;
use crate::config::AppConfig;
use crate::coordination::ShutdownToken;
use crate::error::{FluxError, Result};
use crate::exchange::TradeExecutor;
use crate::persistence::DataStorage;
use crate::risk::{PositionBook, RiskEngine, RiskParameters};

/// Loop settings, usually derived from `AppConfig`
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSettings {
    pub symbols: Vec<String>,
    pub refresh_interval: Duration,
    /// Installed on the risk engine when the loop starts
    pub risk: RiskParameters,
    pub max_concurrent_analyses: usize,
    pub pipeline: PipelineSettings,
}

impl From<&AppConfig> for SystemSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            symbols: config.symbols.clone(),
            refresh_interval: config.refresh_interval(),
            risk: config.risk,
            max_concurrent_analyses: config.trading.max_concurrent_analyses,
            pipeline: PipelineSettings::from(config),
        }
    }
}

/// Wires the collector subscription and the risk monitor to the
/// analysis, risk and execution collaborators
pub struct QuantSystem {
    pipeline: Arc<Pipeline>,
    symbols: Vec<String>,
    refresh_interval: Duration,
    initial_risk: RiskParameters,
    max_concurrent: usize,
    analyses_skipped: Arc<AtomicU64>,
}

impl QuantSystem {
    pub fn new(
        settings: SystemSettings,
        collector: Arc<MultiSourceCollector>,
        storage: Arc<dyn DataStorage>,
        analyzer: Arc<dyn Analyzer>,
        risk: Arc<RiskEngine>,
        executor: Arc<dyn TradeExecutor>,
    ) -> Self {
        let pipeline = Pipeline {
            collector,
            storage,
            analyzer,
            risk,
            executor,
            book: None,
            settings: settings.pipeline,
            trade_gate: tokio::sync::Mutex::new(()),
        };

        Self {
            pipeline: Arc::new(pipeline),
            symbols: settings.symbols,
            refresh_interval: settings.refresh_interval,
            initial_risk: settings.risk,
            max_concurrent: settings.max_concurrent_analyses.max(1),
            analyses_skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Track fills and marks in `book`; pass the same book to the risk
    /// engine as its position provider. Builder-only: ignored once the
    /// pipeline has been shared.
    pub fn with_position_book(mut self, book: Arc<PositionBook>) -> Self {
        if let Some(pipeline) = Arc::get_mut(&mut self.pipeline) {
            pipeline.book = Some(book);
        }
        self
    }

    /// Snapshots skipped because every analysis slot was busy
    pub fn analyses_skipped(&self) -> u64 {
        self.analyses_skipped.load(Ordering::Relaxed)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Run until shutdown or until both input channels have closed.
    ///
    /// Snapshots are analyzed in spawned tasks bounded by a semaphore; a
    /// snapshot arriving while every slot is busy is skipped. Alerts are
    /// handled inline.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        self.pipeline
            .risk
            .set_risk_parameters(self.initial_risk)
            .await?;
        debug!("risk parameters installed");

        let mut market = self.pipeline.collector.subscribe_to_market_data(
            &self.symbols,
            self.refresh_interval,
            shutdown.clone(),
        )?;
        let mut alerts = self.pipeline.risk.monitor_positions(shutdown.clone());

        info!(
            symbols = ?self.symbols,
            interval_ms = self.refresh_interval.as_millis() as u64,
            max_concurrent = self.max_concurrent,
            "quant system started"
        );

        let slots = Arc::new(Semaphore::new(self.max_concurrent));
        let mut analyses: JoinSet<()> = JoinSet::new();
        let mut market_open = true;
        let mut alerts_open = true;

        while market_open || alerts_open {
            tokio::select! {
                signal = shutdown.cancelled() => {
                    info!(%signal, "quant system received shutdown signal");
                    break;
                }

                snapshot = market.recv(), if market_open => match snapshot {
                    Some(snapshot) => self.dispatch(snapshot, &slots, &mut analyses),
                    None => {
                        warn!("market data channel closed");
                        market_open = false;
                    }
                },

                alert = alerts.recv(), if alerts_open => match alert {
                    Some(alert) => {
                        debug!(symbol = %alert.symbol, severity = %alert.severity, "risk alert received");
                        if let Err(e) = self.pipeline.handle_risk_alert(&alert).await {
                            error!(symbol = %alert.symbol, error = %e, "error handling risk alert");
                        }
                    }
                    None => {
                        warn!("risk alert channel closed");
                        alerts_open = false;
                    }
                },

                Some(joined) = analyses.join_next(), if !analyses.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "market data handler panicked");
                    }
                }
            }
        }

        market.join().await;
        while let Some(joined) = analyses.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "market data handler panicked");
            }
        }

        info!(
            dropped_snapshots = market.dropped(),
            dropped_alerts = self.pipeline.risk.alerts_dropped(),
            skipped_analyses = self.analyses_skipped(),
            "quant system stopped"
        );
        Ok(())
    }

    fn dispatch(
        &self,
        snapshot: crate::domain::MarketSnapshot,
        slots: &Arc<Semaphore>,
        analyses: &mut JoinSet<()>,
    ) {
        let permit = match Arc::clone(slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let total = self.analyses_skipped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(symbol = %snapshot.symbol, skipped_total = total, "all analysis slots busy, skipping snapshot");
                return;
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        analyses.spawn(async move {
            let _permit = permit;
            let symbol = snapshot.symbol.clone();
            match pipeline.handle_market_data(snapshot).await {
                Ok(PipelineOutcome::Executed(order)) => {
                    debug!(%symbol, order_id = ?order.order_id, "snapshot led to execution");
                }
                Ok(outcome) => debug!(%symbol, ?outcome, "snapshot handled"),
                Err(FluxError::OrderRejected(reason)) => {
                    warn!(%symbol, %reason, "order rejected by executor");
                }
                Err(e) => error!(%symbol, error = %e, "error handling market data"),
            }
        });
    }
}
