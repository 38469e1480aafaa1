//! Risk management
//!
//! - Parameter store swapped as a whole under a write lock
//! - Pre-trade scoring against the active limits and the daily window
//! - Background monitor emitting position-loss alerts and rolling the window

mod engine;
mod monitor;
mod positions;
mod types;

pub use engine::{
    assess_order, RiskEngine, DAILY_VOLUME_MULTIPLIER, ESTIMATED_LOSS_RATIO, MAX_DAILY_TRADES,
};
pub use monitor::{MonitorConfig, ALERT_BUFFER};
pub use positions::{NoPositions, PositionBook, PositionProvider};
pub use types::{
    AlertSeverity, DailyStats, Position, RiskAlert, RiskAssessment, RiskCheck, RiskParameters,
    TradeFill,
};
