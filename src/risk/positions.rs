//! Position sources for the monitor

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::Position;
use crate::domain::{Order, OrderSide};
use crate::error::Result;

/// Supplies the open positions the monitor inspects on each poll
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn open_positions(&self) -> Result<Vec<Position>>;
}

/// Provider for engines that are not wired to any book
pub struct NoPositions;

#[async_trait]
impl PositionProvider for NoPositions {
    async fn open_positions(&self) -> Result<Vec<Position>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Default)]
struct BookEntry {
    quantity: f64,
    avg_entry: f64,
    mark: f64,
}

/// In-process position book fed by fills and price marks.
///
/// Long-only: sells reduce the held quantity and never go short.
#[derive(Default)]
pub struct PositionBook {
    entries: RwLock<HashMap<String, BookEntry>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a filled order; returns the realized PnL of the fill
    pub async fn apply_fill(&self, order: &Order, fill_price: f64) -> f64 {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(order.symbol.clone()).or_default();
        entry.mark = fill_price;

        match order.side {
            OrderSide::Buy => {
                let cost = entry.quantity * entry.avg_entry + order.amount * fill_price;
                entry.quantity += order.amount;
                if entry.quantity > 0.0 {
                    entry.avg_entry = cost / entry.quantity;
                }
                0.0
            }
            OrderSide::Sell => {
                let sold = order.amount.min(entry.quantity);
                let realized = sold * (fill_price - entry.avg_entry);
                entry.quantity -= sold;
                if entry.quantity <= f64::EPSILON {
                    entries.remove(&order.symbol);
                }
                debug!(symbol = %order.symbol, sold, realized, "position reduced");
                realized
            }
        }
    }

    /// Update the mark price used for unrealized PnL
    pub async fn mark(&self, symbol: &str, price: f64) {
        if let Some(entry) = self.entries.write().await.get_mut(symbol) {
            entry.mark = price;
        }
    }

    pub async fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.entries.read().await.get(symbol).map(|e| e.mark)
    }

    pub async fn quantity(&self, symbol: &str) -> f64 {
        self.entries
            .read()
            .await
            .get(symbol)
            .map(|e| e.quantity)
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl PositionProvider for PositionBook {
    async fn open_positions(&self) -> Result<Vec<Position>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(_, e)| e.quantity > 0.0)
            .map(|(symbol, e)| Position {
                symbol: symbol.clone(),
                unrealized_pnl: e.quantity * (e.mark - e.avg_entry),
            })
            .collect())
    }
}
