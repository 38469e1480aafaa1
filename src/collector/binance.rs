//! Binance public REST data source
//!
//! Token identity comes from `exchangeInfo`, market data from the 24h
//! ticker. Binance has no social feed, so social metrics are always empty.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::source::DataSource;
use crate::domain::{MarketSnapshot, TokenInfo};
use crate::error::{FluxError, Result};

const BINANCE_API_URL: &str = "https://api.binance.com";
const SOURCE_NAME: &str = "binance";

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    #[allow(dead_code)]
    symbol: String,
    base_asset: String,
}

/// Subset of `/api/v3/ticker/24hr`; Binance sends numbers as strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    volume: String,
    price_change_percent: String,
}

/// Binance spot market data source
pub struct BinanceDataSource {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceDataSource {
    /// Create a source against the public Binance endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_API_URL)
    }

    /// Create a source against a custom endpoint (testnet, proxy)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FluxError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        debug!(%url, "binance request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FluxError::source_failure(SOURCE_NAME, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FluxError::source_failure(
                SOURCE_NAME,
                format!("unexpected status code: {}", response.status()),
            ));
        }

        Ok(response.json::<T>().await?)
    }
}

fn parse_field(name: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| FluxError::source_failure(SOURCE_NAME, format!("failed to parse {}: {}", name, e)))
}

fn token_info_from(symbol: &str, info: ExchangeInfo) -> Result<TokenInfo> {
    let first = info.symbols.into_iter().next().ok_or_else(|| {
        FluxError::source_failure(SOURCE_NAME, format!("symbol {} not found", symbol))
    })?;

    // exchangeInfo only knows the trading pair; the base asset doubles as name
    Ok(TokenInfo::new(&first.base_asset, &first.base_asset))
}

fn snapshot_from(symbol: &str, ticker: Ticker24h) -> Result<MarketSnapshot> {
    let price = parse_field("price", &ticker.last_price)?;
    let volume = parse_field("volume", &ticker.volume)?;
    let change = parse_field("price change", &ticker.price_change_percent)?;

    Ok(MarketSnapshot {
        symbol: symbol.to_string(),
        price,
        volume_24h: volume,
        // not derivable from a 24h ticker
        market_cap: 0.0,
        price_change_1h: 0.0,
        price_change_24h: change,
        timestamp: Utc::now(),
    })
}

#[async_trait]
impl DataSource for BinanceDataSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn collect_token_info(&self, symbol: &str) -> Result<TokenInfo> {
        let url = format!("{}/api/v3/exchangeInfo?symbol={}", self.base_url, symbol);
        let info: ExchangeInfo = self.get_json(&url).await?;
        token_info_from(symbol, info)
    }

    async fn collect_market_data(&self, symbol: &str) -> Result<MarketSnapshot> {
        let url = format!("{}/api/v3/ticker/24hr?symbol={}", self.base_url, symbol);
        let ticker: Ticker24h = self.get_json(&url).await?;
        snapshot_from(symbol, ticker)
    }

    async fn collect_social_metrics(&self, _symbol: &str) -> Result<HashMap<String, f64>> {
        Ok(HashMap::new())
    }
}
