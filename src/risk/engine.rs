use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::monitor::{run_monitor, MonitorConfig, MonitorContext};
use super::positions::{NoPositions, PositionProvider};
use super::types::{DailyStats, RiskAlert, RiskAssessment, RiskCheck, RiskParameters, TradeFill};
use crate::coordination::ShutdownToken;
use crate::domain::{Order, OrderSide, OrderType};
use crate::error::Result;

/// Share of the notional assumed lost in the worst case
pub const ESTIMATED_LOSS_RATIO: f64 = 0.1;
/// Daily volume cap as a multiple of `max_position_size`
pub const DAILY_VOLUME_MULTIPLIER: f64 = 5.0;
/// Trades per window above which frequency is flagged
pub const MAX_DAILY_TRADES: u64 = 100;

/// Risk engine gating trades and watching open positions
pub struct RiskEngine {
    /// Active limits; replaced whole under the write lock
    params: Arc<RwLock<RiskParameters>>,
    /// Current daily window
    stats: Arc<RwLock<DailyStats>>,
    /// Anchor for the daily window boundaries
    created_at: Instant,
    monitor_config: MonitorConfig,
    positions: Arc<dyn PositionProvider>,
    alerts_dropped: Arc<AtomicU64>,
}

impl RiskEngine {
    /// Create an engine with the given limits.
    ///
    /// The limits are installed as-is; use [`RiskEngine::try_new`] to
    /// validate them first.
    pub fn new(initial: RiskParameters) -> Self {
        Self {
            params: Arc::new(RwLock::new(initial)),
            stats: Arc::new(RwLock::new(DailyStats::new())),
            created_at: Instant::now(),
            monitor_config: MonitorConfig::default(),
            positions: Arc::new(NoPositions),
            alerts_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create an engine, rejecting non-positive limits
    pub fn try_new(initial: RiskParameters) -> Result<Self> {
        initial.validate()?;
        Ok(Self::new(initial))
    }

    /// Monitor cadence; zero periods and an empty alert buffer are rejected
    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        self.monitor_config = config;
        Ok(self)
    }

    /// Source of open positions for the monitor
    pub fn with_position_provider(mut self, positions: Arc<dyn PositionProvider>) -> Self {
        self.positions = positions;
        self
    }

    // ==================== Parameters ====================

    /// Replace the whole parameter set; invalid sets leave the old one active
    pub async fn set_risk_parameters(&self, params: RiskParameters) -> Result<()> {
        if let Err(e) = params.validate() {
            warn!(error = %e, "rejected risk parameter update");
            return Err(e);
        }

        *self.params.write().await = params;
        info!(
            max_position_size = params.max_position_size,
            max_loss_per_trade = params.max_loss_per_trade,
            max_daily_loss = params.max_daily_loss,
            "risk parameters updated"
        );
        Ok(())
    }

    /// Copy of the active parameters
    pub async fn risk_parameters(&self) -> RiskParameters {
        *self.params.read().await
    }

    // ==================== Pre-Trade Checks ====================

    /// Evaluate an order against the active limits and the daily window.
    ///
    /// Locks are held only long enough to copy state; the evaluation runs
    /// on the copies and never mutates daily statistics.
    pub async fn check_trade_risk(&self, order: &Order) -> RiskAssessment {
        let params = *self.params.read().await;
        let stats = self.stats.read().await.clone();

        let assessment = assess_order(&params, &stats, order);
        debug!(
            symbol = %order.symbol,
            acceptable = assessment.is_acceptable,
            risk_level = assessment.risk_level,
            factors = assessment.risk_factors.len(),
            "trade risk assessed"
        );
        assessment
    }

    // ==================== Post-Trade Updates ====================

    /// Feed an executed trade into the daily window
    pub async fn record_trade(&self, fill: TradeFill) {
        let mut stats = self.stats.write().await;
        stats.trading_volume += fill.notional.abs();
        stats.trade_count += 1;
        if fill.realized_pnl < 0.0 {
            stats.total_loss += -fill.realized_pnl;
        }

        debug!(
            symbol = %fill.symbol,
            notional = fill.notional,
            daily_volume = stats.trading_volume,
            daily_loss = stats.total_loss,
            trades = stats.trade_count,
            "trade recorded"
        );
    }

    /// Copy of the current daily window
    pub async fn daily_stats(&self) -> DailyStats {
        self.stats.read().await.clone()
    }

    /// Zero the daily window now (manual intervention)
    pub async fn reset_daily_stats(&self) {
        let mut stats = self.stats.write().await;
        let index = stats.window_index;
        stats.reset(index);
        info!("daily statistics reset manually");
    }

    // ==================== Monitoring ====================

    /// Start the background position monitor.
    ///
    /// The returned channel closes once `shutdown` fires and the monitor
    /// loop has returned. A full channel drops the new alert.
    pub fn monitor_positions(&self, shutdown: ShutdownToken) -> mpsc::Receiver<RiskAlert> {
        let (tx, rx) = mpsc::channel(self.monitor_config.alert_buffer.max(1));

        let ctx = MonitorContext {
            params: Arc::clone(&self.params),
            stats: Arc::clone(&self.stats),
            positions: Arc::clone(&self.positions),
            alerts_dropped: Arc::clone(&self.alerts_dropped),
            created_at: self.created_at,
            config: self.monitor_config.clone(),
        };

        tokio::spawn(run_monitor(ctx, tx, shutdown));
        rx
    }

    /// Alerts dropped because the alert channel was full
    pub fn alerts_dropped(&self) -> u64 {
        self.alerts_dropped.load(Ordering::Relaxed)
    }
}

/// Sequential additive scoring of one order.
///
/// Every check runs; a rejecting check flips `is_acceptable` but the
/// remaining checks still add their factors.
pub fn assess_order(params: &RiskParameters, stats: &DailyStats, order: &Order) -> RiskAssessment {
    let mut assessment = RiskAssessment::acceptable();
    let order_value = order.value();
    let estimated_loss = order_value * ESTIMATED_LOSS_RATIO;

    if order_value > params.max_position_size {
        assessment.record(
            RiskCheck::PositionSize,
            format!(
                "Reduce position size below {:.2}",
                params.max_position_size
            ),
        );
    } else if order.side == OrderSide::Buy && estimated_loss > params.max_loss_per_trade {
        assessment.record(
            RiskCheck::LossPerTrade,
            format!(
                "Reduce position size to limit potential loss below {:.2}",
                params.max_loss_per_trade
            ),
        );
    }

    if stats.total_loss + estimated_loss > params.max_daily_loss {
        assessment.record(
            RiskCheck::DailyLoss,
            "Wait for daily loss limit to reset or reduce position size".to_string(),
        );
    }

    if order.order_type == OrderType::Market {
        assessment.record(
            RiskCheck::MarketOrder,
            "Consider using limit order for better price control".to_string(),
        );
    }

    if stats.trading_volume + order_value > params.max_position_size * DAILY_VOLUME_MULTIPLIER {
        assessment.record(
            RiskCheck::DailyVolume,
            "Reduce trading volume or wait for daily reset".to_string(),
        );
    }

    if stats.trade_count > MAX_DAILY_TRADES {
        assessment.record(
            RiskCheck::TradeFrequency,
            "Consider reducing trading frequency".to_string(),
        );
    }

    assessment
}
