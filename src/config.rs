use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::ai::ChatConfig;
use crate::domain::OrderType;
use crate::risk::{MonitorConfig, RiskParameters};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Trading pairs to watch (e.g. "BTCUSDT")
    pub symbols: Vec<String>,
    /// Subscription poll interval
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Initial risk limits; no field has a default
    pub risk: RiskParameters,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_refresh_interval_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Binance REST base URL
    pub binance_url: String,
    /// Subscription channel capacity
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            binance_url: "https://api.binance.com".to_string(),
            channel_capacity: crate::collector::SUBSCRIPTION_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Predictions below this confidence are ignored
    pub min_confidence: f64,
    /// Projects above this scam probability are skipped
    pub scam_threshold: f64,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub predict_time_frame: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        let chat = ChatConfig::default();
        Self {
            min_confidence: 0.7,
            scam_threshold: 0.5,
            api_key: chat.api_key,
            endpoint: chat.endpoint,
            model: chat.model,
            temperature: chat.temperature,
            timeout_secs: chat.timeout_secs,
            predict_time_frame: chat.predict_time_frame,
        }
    }
}

impl AiConfig {
    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout_secs: self.timeout_secs,
            predict_time_frame: self.predict_time_frame.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub max_order_amount: f64,
    pub min_order_amount: f64,
    /// Relative move the prediction must clear before an order is built
    pub price_tolerance: f64,
    pub order_type: OrderType,
    /// Market snapshots analyzed at the same time
    pub max_concurrent_analyses: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            max_order_amount: 1.0,
            min_order_amount: 0.01,
            price_tolerance: 0.02,
            order_type: OrderType::Limit,
            max_concurrent_analyses: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// paper | binance
    pub exchange: String,
    /// Route every order to the paper executor
    pub dry_run: bool,
    /// Starting holdings for the paper executor, keyed by symbol
    pub paper_balances: HashMap<String, f64>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            exchange: "paper".to_string(),
            dry_run: true,
            paper_balances: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; in-memory storage when unset
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log filter directive (e.g. "info" or "info,quantaflux=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info,quantaflux=debug,sqlx=warn".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("refresh_interval_ms", default_refresh_interval_ms() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", default_max_connections() as i64)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QUANTAFLUX_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // QUANTAFLUX__RISK__MAX_DAILY_LOSS=2000, QUANTAFLUX__AI__API_KEY=...
            .add_source(
                Environment::with_prefix("QUANTAFLUX")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.symbols.is_empty() {
            errors.push("symbols must not be empty".to_string());
        }

        if self.refresh_interval_ms == 0 {
            errors.push("refresh_interval_ms must be positive".to_string());
        }

        if let Err(e) = self.risk.validate() {
            errors.push(e.to_string());
        }

        if !(0.0..=1.0).contains(&self.ai.min_confidence) {
            errors.push("ai.min_confidence must be between 0 and 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.ai.scam_threshold) {
            errors.push("ai.scam_threshold must be between 0 and 1".to_string());
        }

        if self.trading.min_order_amount <= 0.0 {
            errors.push("trading.min_order_amount must be positive".to_string());
        }

        if self.trading.max_order_amount < self.trading.min_order_amount {
            errors.push("trading.max_order_amount must be >= min_order_amount".to_string());
        }

        if self.trading.price_tolerance < 0.0 {
            errors.push("trading.price_tolerance must not be negative".to_string());
        }

        if self.trading.max_concurrent_analyses == 0 {
            errors.push("trading.max_concurrent_analyses must be at least 1".to_string());
        }

        if let Err(e) = crate::exchange::parse_exchange_kind(&self.exchange.exchange) {
            errors.push(e.to_string());
        }

        if let Err(e) = self.monitor.validate() {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
