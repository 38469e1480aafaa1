//! Background position monitor
//!
//! Two independent timers drive the loop: a short poll that inspects open
//! positions and a daily-reset tick anchored at engine construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::positions::PositionProvider;
use super::types::{DailyStats, RiskAlert, RiskParameters};
use crate::coordination::ShutdownToken;
use crate::error::{FluxError, Result};

/// Default alert channel capacity
pub const ALERT_BUFFER: usize = 100;

/// Monitor cadence and buffering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    #[serde(with = "duration_secs")]
    pub reset_period: Duration,
    pub alert_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            reset_period: Duration::from_secs(24 * 60 * 60),
            alert_buffer: ALERT_BUFFER,
        }
    }
}

impl MonitorConfig {
    /// Both timers need a non-zero period and the channel a slot
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(FluxError::InvalidParameter(
                "monitor poll_interval must be positive".to_string(),
            ));
        }
        if self.reset_period.is_zero() {
            return Err(FluxError::InvalidParameter(
                "monitor reset_period must be positive".to_string(),
            ));
        }
        if self.alert_buffer == 0 {
            return Err(FluxError::InvalidParameter(
                "monitor alert_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !(secs > 0.0) {
            return Err(serde::de::Error::custom("duration must be a positive number of seconds"));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| serde::de::Error::custom(format!("duration of {} seconds: {}", secs, e)))
    }
}

/// State the monitor task shares with its engine
pub(crate) struct MonitorContext {
    pub params: Arc<RwLock<RiskParameters>>,
    pub stats: Arc<RwLock<DailyStats>>,
    pub positions: Arc<dyn PositionProvider>,
    pub alerts_dropped: Arc<AtomicU64>,
    pub created_at: Instant,
    pub config: MonitorConfig,
}

impl MonitorContext {
    /// Index of the daily window containing `now`
    fn window_index(&self, now: Instant) -> u64 {
        let period = self.config.reset_period.as_nanos().max(1);
        (now.saturating_duration_since(self.created_at).as_nanos() / period) as u64
    }

    /// Reset the daily stats if `now` lies in a later window than the stored one.
    ///
    /// Returns whether a reset happened; each boundary resets at most once
    /// even if several monitors share the same stats.
    async fn roll_window(&self, now: Instant) -> bool {
        let index = self.window_index(now);
        let mut stats = self.stats.write().await;
        if stats.window_index >= index {
            return false;
        }

        info!(
            window = index,
            total_loss = stats.total_loss,
            trading_volume = stats.trading_volume,
            trade_count = stats.trade_count,
            "daily statistics reset"
        );
        stats.reset(index);
        true
    }

    /// Inspect open positions; returns false once the alert receiver is gone
    async fn poll(&self, tx: &mpsc::Sender<RiskAlert>) -> bool {
        let positions = match self.positions.open_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "failed to load open positions");
                return true;
            }
        };

        let max_loss = self.params.read().await.max_loss_per_trade;

        for position in positions
            .iter()
            .filter(|p| p.unrealized_pnl < -max_loss)
        {
            let alert = RiskAlert::position_loss(position);
            debug!(
                symbol = %alert.symbol,
                severity = %alert.severity,
                unrealized_pnl = position.unrealized_pnl,
                "position loss alert"
            );

            match tx.try_send(alert) {
                Ok(()) => {}
                Err(TrySendError::Full(alert)) => {
                    let total = self.alerts_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(symbol = %alert.symbol, dropped_total = total, "alert channel full, dropping alert");
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }

        true
    }
}

/// Monitor loop; the sender drops when this returns, closing the channel
pub(crate) async fn run_monitor(
    ctx: MonitorContext,
    tx: mpsc::Sender<RiskAlert>,
    mut shutdown: ShutdownToken,
) {
    let poll_every = ctx.config.poll_interval;
    let reset_every = ctx.config.reset_period;

    let mut poll = tokio::time::interval_at(Instant::now() + poll_every, poll_every);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut reset = tokio::time::interval_at(ctx.created_at + reset_every, reset_every);
    reset.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        poll_secs = poll_every.as_secs_f64(),
        reset_secs = reset_every.as_secs_f64(),
        "position monitor started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("position monitor received shutdown signal");
                break;
            }

            _ = poll.tick() => {
                if !ctx.poll(&tx).await {
                    debug!("alert receiver dropped, stopping position monitor");
                    break;
                }
            }

            tick = reset.tick() => {
                ctx.roll_window(tick).await;
            }
        }
    }

    info!("position monitor stopped");
}
