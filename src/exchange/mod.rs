pub mod factory;
mod paper;
mod traits;

pub use factory::build_executor;
pub use paper::PaperExecutor;
pub use traits::{parse_exchange_kind, ExchangeKind, TradeExecutor};

#[cfg(test)]
pub use traits::MockTradeExecutor;
