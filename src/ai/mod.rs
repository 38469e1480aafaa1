//! AI analysis collaborators
//!
//! The orchestrator only sees the [`Analyzer`] trait; [`ChatAnalyzer`] backs
//! it with any OpenAI-compatible chat-completions endpoint.

mod chat;

pub use chat::{ChatAnalyzer, ChatConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{MarketSnapshot, ProjectMetrics, TokenInfo};
use crate::error::Result;

/// Price forecast for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    pub symbol: String,
    pub predicted_price: f64,
    /// 0..=1
    pub confidence: f64,
    pub time_frame: String,
    #[serde(default)]
    pub factors: Vec<String>,
}

/// Scam likelihood for a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScamAnalysis {
    pub scam_probability: f64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub confidence: f64,
}

/// Project, price, sentiment and scam analysis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Score a project across social, development and risk dimensions
    async fn analyze_project(&self, info: &TokenInfo) -> Result<ProjectMetrics>;

    /// Forecast from a non-empty, time-ordered snapshot series
    async fn predict_price(&self, data: &[MarketSnapshot]) -> Result<PricePrediction>;

    /// Sentiment in -1..=1 from per-platform text
    async fn analyze_sentiment(&self, social_data: &HashMap<String, String>) -> Result<f64>;

    async fn detect_scam(&self, project: &ProjectMetrics) -> Result<ScamAnalysis>;
}
