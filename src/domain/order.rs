use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order created but not yet submitted
    New,
    /// Order accepted by the exchange
    Submitted,
    /// Order partially filled
    PartiallyFilled,
    /// Order fully filled
    Filled,
    /// Order cancelled
    Cancelled,
    /// Order rejected by exchange
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Order handed to the trade executor.
///
/// The risk engine only reads it; the executor fills in `status` and
/// `order_id` on placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub amount: f64,
    /// Limit price; may be 0 for market orders
    pub price: f64,
    pub order_type: OrderType,
    pub status: OrderStatus,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl Order {
    pub fn new(symbol: &str, side: OrderSide, amount: f64, price: f64, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            amount,
            price,
            order_type,
            status: OrderStatus::New,
            order_id: None,
        }
    }

    pub fn buy_limit(symbol: &str, amount: f64, price: f64) -> Self {
        Self::new(symbol, OrderSide::Buy, amount, price, OrderType::Limit)
    }

    pub fn buy_market(symbol: &str, amount: f64, price: f64) -> Self {
        Self::new(symbol, OrderSide::Buy, amount, price, OrderType::Market)
    }

    pub fn sell_market(symbol: &str, amount: f64) -> Self {
        Self::new(symbol, OrderSide::Sell, amount, 0.0, OrderType::Market)
    }

    /// Notional value (amount x price)
    pub fn value(&self) -> f64 {
        self.amount * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_value() {
        let order = Order::buy_limit("BTCUSDT", 2.0, 1500.0);
        assert_eq!(order.value(), 3000.0);
        assert_eq!(order.status, OrderStatus::New);
        assert!(order.order_id.is_none());
    }

    #[test]
    fn test_side_serde_lowercase() {
        let json = serde_json::to_string(&OrderSide::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
        let parsed: OrderType = serde_json::from_str("\"market\"").unwrap();
        assert_eq!(parsed, OrderType::Market);
    }
}
