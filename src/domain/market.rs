use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time price/volume observation for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub price_change_1h: f64,
    pub price_change_24h: f64,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Snapshot with only a price, stamped now
    pub fn new(symbol: &str, price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            volume_24h: 0.0,
            market_cap: 0.0,
            price_change_1h: 0.0,
            price_change_24h: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_volume(mut self, volume_24h: f64) -> Self {
        self.volume_24h = volume_24h;
        self
    }

    pub fn with_price_change_24h(mut self, pct: f64) -> Self {
        self.price_change_24h = pct;
        self
    }
}

/// Static facts about a token (rarely changes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub contract_address: String,
    /// eth, bsc, ...
    #[serde(default)]
    pub network: String,
    /// IDO, IEO, ...
    #[serde(default)]
    pub launch_type: String,
    #[serde(default)]
    pub launch_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub initial_price: f64,
    #[serde(default)]
    pub total_supply: f64,
    #[serde(default)]
    pub circulating_supply: f64,
    #[serde(default)]
    pub team_allocation: f64,
    #[serde(default)]
    pub vesting_schedule: String,
}

impl TokenInfo {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Scored view of a project, fed to scam detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub token_info: TokenInfo,
    pub social_score: f64,
    pub development_score: f64,
    pub community_growth: f64,
    pub market_sentiment: f64,
    pub risk_score: f64,
    pub updated_at: DateTime<Utc>,
}

impl ProjectMetrics {
    /// Metrics carrying only a social score
    pub fn from_social_score(token_info: TokenInfo, social_score: f64) -> Self {
        Self {
            token_info,
            social_score,
            development_score: 0.0,
            community_growth: 0.0,
            market_sentiment: 0.0,
            risk_score: 0.0,
            updated_at: Utc::now(),
        }
    }
}
