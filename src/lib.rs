pub mod ai;
pub mod cli;
pub mod collector;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod orchestrator;
pub mod persistence;
pub mod risk;

pub use collector::{DataSource, MarketDataSubscription, MultiSourceCollector};
pub use config::AppConfig;
pub use coordination::{Shutdown, ShutdownSignal, ShutdownToken};
pub use error::{FluxError, Result};
pub use orchestrator::{QuantSystem, SystemSettings};
pub use risk::{RiskAlert, RiskAssessment, RiskEngine, RiskParameters};
