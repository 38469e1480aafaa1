use std::sync::Arc;

use tracing::info;

use crate::config::ExchangeConfig;
use crate::error::{FluxError, Result};

use super::{parse_exchange_kind, ExchangeKind, PaperExecutor, TradeExecutor};

/// Create the runtime executor from `ExchangeConfig`.
///
/// Dry-run always routes to the paper executor, whatever exchange is named.
pub fn build_executor(config: &ExchangeConfig) -> Result<Arc<dyn TradeExecutor>> {
    let exchange = parse_exchange_kind(&config.exchange)?;

    if config.dry_run || exchange == ExchangeKind::Paper {
        let executor = PaperExecutor::with_balances(config.paper_balances.clone());
        info!(exchange = %exchange, "using paper executor");
        return Ok(Arc::new(executor));
    }

    Err(FluxError::InvalidParameter(format!(
        "live order routing for '{}' is not available; set exchange.dry_run = true",
        exchange
    )))
}
