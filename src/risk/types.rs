use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FluxError, Result};

/// Risk limits, installed and replaced as a whole
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Maximum notional of a single order
    pub max_position_size: f64,
    /// Maximum estimated loss of a single buy
    pub max_loss_per_trade: f64,
    /// Maximum accumulated loss per daily window
    pub max_daily_loss: f64,
    pub max_leverage: f64,
    pub min_liquidity: f64,
}

impl RiskParameters {
    /// Every field must be strictly positive (NaN is rejected too)
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_position_size", self.max_position_size),
            ("max_loss_per_trade", self.max_loss_per_trade),
            ("max_daily_loss", self.max_daily_loss),
            ("max_leverage", self.max_leverage),
            ("min_liquidity", self.min_liquidity),
        ];

        let invalid: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| !(*value > 0.0))
            .map(|(name, _)| *name)
            .collect();

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(FluxError::InvalidParameter(format!(
                "risk parameters must be positive: {}",
                invalid.join(", ")
            )))
        }
    }
}

/// Rolling accumulation for the current daily window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub total_loss: f64,
    pub trading_volume: f64,
    pub trade_count: u64,
    pub window_started: DateTime<Utc>,
    /// Number of windows elapsed since engine construction
    pub window_index: u64,
}

impl DailyStats {
    pub fn new() -> Self {
        Self {
            total_loss: 0.0,
            trading_volume: 0.0,
            trade_count: 0,
            window_started: Utc::now(),
            window_index: 0,
        }
    }

    /// Zero the counters and open window `index`
    pub(crate) fn reset(&mut self, index: u64) {
        *self = Self {
            window_index: index,
            ..Self::new()
        };
    }
}

impl Default for DailyStats {
    fn default() -> Self {
        Self::new()
    }
}

/// The six sequential checks of a trade evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCheck {
    PositionSize,
    LossPerTrade,
    DailyLoss,
    MarketOrder,
    DailyVolume,
    TradeFrequency,
}

impl RiskCheck {
    /// Contribution to `risk_level` when the check fires
    pub fn weight(&self) -> f64 {
        match self {
            RiskCheck::PositionSize => 0.3,
            RiskCheck::LossPerTrade => 0.25,
            RiskCheck::DailyLoss => 0.25,
            RiskCheck::MarketOrder => 0.1,
            RiskCheck::DailyVolume => 0.2,
            RiskCheck::TradeFrequency => 0.15,
        }
    }

    /// Whether firing makes the order unacceptable on its own
    pub fn rejects(&self) -> bool {
        !matches!(self, RiskCheck::MarketOrder | RiskCheck::TradeFrequency)
    }

    pub fn factor(&self) -> &'static str {
        match self {
            RiskCheck::PositionSize => "Position size exceeds maximum allowed",
            RiskCheck::LossPerTrade => "Potential loss exceeds maximum allowed per trade",
            RiskCheck::DailyLoss => "Trade could exceed maximum daily loss limit",
            RiskCheck::MarketOrder => "Market order may result in slippage",
            RiskCheck::DailyVolume => "Daily trading volume would exceed safe limits",
            RiskCheck::TradeFrequency => "High trading frequency detected",
        }
    }
}

/// Outcome of one trade evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub is_acceptable: bool,
    /// Additive, unbounded score
    pub risk_level: f64,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    /// Checks that fired, in evaluation order
    pub triggered: Vec<RiskCheck>,
}

impl RiskAssessment {
    /// Acceptable, zero risk, nothing recorded
    pub fn acceptable() -> Self {
        Self {
            is_acceptable: true,
            risk_level: 0.0,
            risk_factors: Vec::new(),
            recommendations: Vec::new(),
            triggered: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, check: RiskCheck, recommendation: String) {
        if check.rejects() {
            self.is_acceptable = false;
        }
        self.risk_level += check.weight();
        self.risk_factors.push(check.factor().to_string());
        self.recommendations.push(recommendation);
        self.triggered.push(check);
    }

    pub fn has(&self, check: RiskCheck) -> bool {
        self.triggered.contains(&check)
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    /// Severity from an unrealized PnL; cut points are strict `<`, so
    /// exactly -10000 is Medium and exactly -5000 is Low.
    pub fn from_pnl(pnl: f64) -> Self {
        if pnl < -10_000.0 {
            AlertSeverity::High
        } else if pnl < -5_000.0 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert emitted by the position monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub symbol: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl RiskAlert {
    pub const POSITION_LOSS: &'static str = "Position Loss";

    pub fn position_loss(position: &Position) -> Self {
        Self {
            symbol: position.symbol.clone(),
            alert_type: Self::POSITION_LOSS.to_string(),
            severity: AlertSeverity::from_pnl(position.unrealized_pnl),
            description: format!(
                "Position loss exceeded threshold for {} (unrealized pnl {:.2})",
                position.symbol, position.unrealized_pnl
            ),
            timestamp: Utc::now(),
        }
    }
}

/// Open position as seen by the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub unrealized_pnl: f64,
}

/// Executed-trade feedback for the daily window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    pub symbol: String,
    /// Filled amount x fill price
    pub notional: f64,
    /// Realized PnL of the fill; losses are negative
    pub realized_pnl: f64,
}
