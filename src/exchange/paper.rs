//! Dry-run executor
//!
//! Fills every accepted order immediately at its limit price, or at the
//! last marked price for market orders. Holdings are tracked per symbol.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{ExchangeKind, TradeExecutor};
use crate::domain::{Order, OrderSide, OrderStatus, OrderType};
use crate::error::{FluxError, Result};

#[derive(Default)]
pub struct PaperExecutor {
    orders: DashMap<String, Order>,
    balances: DashMap<String, f64>,
    marks: DashMap<String, f64>,
}

impl PaperExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with pre-existing holdings
    pub fn with_balances(balances: HashMap<String, f64>) -> Self {
        let executor = Self::new();
        for (symbol, amount) in balances {
            executor.balances.insert(symbol, amount);
        }
        executor
    }

    /// Record the latest traded price for market fills
    pub fn mark(&self, symbol: &str, price: f64) {
        self.marks.insert(symbol.to_string(), price);
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn fill_price(&self, order: &Order) -> Result<f64> {
        let price = match order.order_type {
            OrderType::Limit => order.price,
            OrderType::Market => self
                .marks
                .get(&order.symbol)
                .map(|p| *p)
                .unwrap_or(order.price),
        };

        if price > 0.0 {
            Ok(price)
        } else {
            Err(FluxError::OrderRejected(format!(
                "no price available for {}",
                order.symbol
            )))
        }
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Paper
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    async fn place_order(&self, order: &mut Order) -> Result<()> {
        if !(order.amount > 0.0) {
            order.status = OrderStatus::Rejected;
            return Err(FluxError::OrderRejected(format!(
                "invalid amount {} for {}",
                order.amount, order.symbol
            )));
        }

        let price = match self.fill_price(order) {
            Ok(price) => price,
            Err(e) => {
                order.status = OrderStatus::Rejected;
                return Err(e);
            }
        };

        {
            let mut held = self.balances.entry(order.symbol.clone()).or_insert(0.0);
            match order.side {
                OrderSide::Buy => *held += order.amount,
                OrderSide::Sell => {
                    if *held < order.amount {
                        order.status = OrderStatus::Rejected;
                        return Err(FluxError::OrderRejected(format!(
                            "insufficient balance for {}: have {}, need {}",
                            order.symbol, *held, order.amount
                        )));
                    }
                    *held -= order.amount;
                }
            }
        }

        let order_id = Uuid::new_v4().to_string();
        order.price = price;
        order.status = OrderStatus::Filled;
        order.order_id = Some(order_id.clone());
        self.orders.insert(order_id.clone(), order.clone());

        info!(
            %order_id,
            symbol = %order.symbol,
            side = %order.side,
            amount = order.amount,
            price,
            "[DRY RUN] order filled"
        );
        Ok(())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .filter(|o| o.symbol == symbol)
            .ok_or_else(|| FluxError::NotFound(format!("order {} for {}", order_id, symbol)))?;

        if order.status.is_terminal() {
            return Err(FluxError::OrderRejected(format!(
                "order {} already {:?}",
                order_id, order.status
            )));
        }

        order.status = OrderStatus::Cancelled;
        debug!(%order_id, %symbol, "[DRY RUN] order cancelled");
        Ok(())
    }

    async fn get_order_status(&self, symbol: &str, order_id: &str) -> Result<Order> {
        self.orders
            .get(order_id)
            .filter(|o| o.symbol == symbol)
            .map(|o| o.clone())
            .ok_or_else(|| FluxError::NotFound(format!("order {} for {}", order_id, symbol)))
    }

    async fn get_balance(&self, symbol: &str) -> Result<f64> {
        Ok(self.balances.get(symbol).map(|b| *b).unwrap_or(0.0))
    }
}
