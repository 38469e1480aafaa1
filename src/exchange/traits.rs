use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::Order;
use crate::error::{FluxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    /// In-process simulated fills
    #[default]
    Paper,
    Binance,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Binance => "binance",
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paper" | "sim" => Ok(Self::Paper),
            "binance" => Ok(Self::Binance),
            _ => Err("invalid exchange; expected paper|binance"),
        }
    }
}

pub fn parse_exchange_kind(raw: &str) -> Result<ExchangeKind> {
    ExchangeKind::from_str(raw).map_err(|e| FluxError::InvalidParameter(e.to_string()))
}

/// Order routing used by the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    fn kind(&self) -> ExchangeKind;

    fn is_dry_run(&self) -> bool;

    /// Submit an order; on success `status`, `order_id` and the executed
    /// `price` are written back into `order`
    async fn place_order(&self, order: &mut Order) -> Result<()>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;

    async fn get_order_status(&self, symbol: &str, order_id: &str) -> Result<Order>;

    /// Free balance of the base asset traded under `symbol`
    async fn get_balance(&self, symbol: &str) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exchange_kind_accepts_aliases() {
        assert_eq!(parse_exchange_kind("paper").unwrap(), ExchangeKind::Paper);
        assert_eq!(parse_exchange_kind(" SIM ").unwrap(), ExchangeKind::Paper);
        assert_eq!(parse_exchange_kind("binance").unwrap(), ExchangeKind::Binance);
    }

    #[test]
    fn parse_exchange_kind_rejects_unknown_value() {
        assert!(parse_exchange_kind("foo").is_err());
    }
}
