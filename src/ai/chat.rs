//! OpenAI-compatible chat-completions analyzer
//!
//! Works against DeepSeek, OpenAI and any endpoint speaking the same
//! `/chat/completions` protocol. Every answer is requested as a JSON object;
//! replies wrapped in markdown code fences are unwrapped before parsing.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Analyzer, PricePrediction, ScamAnalysis};
use crate::domain::{MarketSnapshot, ProjectMetrics, TokenInfo};
use crate::error::{FluxError, Result};

const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com/v1";
const DEFAULT_MODEL: &str = "deepseek-chat";
const SYSTEM_PROMPT: &str = "You are a professional cryptocurrency analyst. \
Answer strictly with the requested JSON object and nothing else.";

/// Chat analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api_key: String,
    /// Base URL, without the `/chat/completions` suffix
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Horizon reported on price predictions
    pub predict_time_frame: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            timeout_secs: 30,
            predict_time_frame: "24h".to_string(),
        }
    }
}

impl ChatConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProjectReply {
    social_score: f64,
    development_score: f64,
    community_growth: f64,
    market_sentiment: f64,
    risk_score: f64,
}

#[derive(Debug, Deserialize)]
struct PredictionReply {
    predicted_price: f64,
    confidence: f64,
    #[serde(default)]
    factors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SentimentReply {
    sentiment_score: f64,
}

#[derive(Debug, Deserialize)]
struct ScamReply {
    scam_probability: f64,
    #[serde(default)]
    risk_factors: Vec<String>,
    confidence: f64,
}

/// Analyzer backed by a chat-completions model
pub struct ChatAnalyzer {
    config: ChatConfig,
    http: Client,
}

impl ChatAnalyzer {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FluxError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Send one prompt and return the raw assistant reply
    async fn complete(&self, prompt: &str) -> Result<String> {
        if !self.is_configured() {
            return Err(FluxError::Analysis("AI API key not configured".to_string()));
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        debug!(model = %self.config.model, %url, "sending chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FluxError::Analysis(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FluxError::Analysis(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            warn!(%status, "chat completion API error");
            return Err(FluxError::Analysis(format!(
                "api error: status={}, body={}",
                status, body
            )));
        }

        let content = reply_content(&body)?;
        debug!(chars = content.len(), "chat completion received");
        Ok(content)
    }

    async fn ask<T: DeserializeOwned>(&self, prompt: &str, what: &str) -> Result<T> {
        let reply = self.complete(prompt).await?;
        parse_reply(&reply)
            .map_err(|e| FluxError::Analysis(format!("failed to parse {} results: {}", what, e)))
    }
}

/// Extract the first choice from a chat-completions body
fn reply_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| FluxError::Analysis(format!("invalid response: {}", e)))?;

    if let Some(err) = response.error {
        return Err(FluxError::Analysis(format!("api error: {}", err.message)));
    }

    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| FluxError::Analysis("no response from api".to_string()))
}

/// Parse a JSON reply, tolerating a surrounding ```json fence
fn parse_reply<T: DeserializeOwned>(reply: &str) -> serde_json::Result<T> {
    serde_json::from_str(strip_code_fence(reply))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line, then the closing fence
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

fn project_prompt(info: &TokenInfo) -> String {
    format!(
        r#"Evaluate this crypto project.
Name: {}
Symbol: {}
Contract: {}
Network: {}
Launch type: {}
Initial price: {}
Total supply: {}
Circulating supply: {}

Score each dimension from 0 to 100 and answer as:
{{"social_score": float, "development_score": float, "community_growth": float, "market_sentiment": float, "risk_score": float}}"#,
        info.name,
        info.symbol,
        info.contract_address,
        info.network,
        info.launch_type,
        info.initial_price,
        info.total_supply,
        info.circulating_supply
    )
}

fn prediction_prompt(data: &[MarketSnapshot], time_frame: &str) -> String {
    let mut series = String::new();
    for d in data {
        let _ = writeln!(
            series,
            "time: {} price: {:.8} volume_24h: {:.2} market_cap: {:.2}",
            d.timestamp.format("%Y-%m-%d %H:%M:%S"),
            d.price,
            d.volume_24h,
            d.market_cap
        );
    }

    format!(
        r#"Forecast the price of {} over the next {} from this market data:

{}
Answer as:
{{"predicted_price": float, "confidence": float between 0 and 1, "factors": [string]}}"#,
        data[0].symbol, time_frame, series
    )
}

fn sentiment_prompt(social_data: &HashMap<String, String>) -> String {
    // Stable platform order keeps prompts reproducible
    let ordered: BTreeMap<_, _> = social_data.iter().collect();
    let mut text = String::new();
    for (platform, content) in ordered {
        let _ = writeln!(text, "== {} ==\n{}\n", platform, content);
    }

    format!(
        r#"Rate the market sentiment of this social data from -1 (very negative) to 1 (very positive):

{}
Answer as:
{{"sentiment_score": float}}"#,
        text
    )
}

fn scam_prompt(project: &ProjectMetrics) -> String {
    format!(
        r#"Assess the scam risk of this project.
Name: {}
Symbol: {}
Contract: {}
Launch type: {}
Social score: {:.2}
Development score: {:.2}
Community growth: {:.2}
Market sentiment: {:.2}
Risk score: {:.2}

Answer as:
{{"scam_probability": float between 0 and 1, "risk_factors": [string], "confidence": float between 0 and 1}}"#,
        project.token_info.name,
        project.token_info.symbol,
        project.token_info.contract_address,
        project.token_info.launch_type,
        project.social_score,
        project.development_score,
        project.community_growth,
        project.market_sentiment,
        project.risk_score
    )
}

#[async_trait]
impl Analyzer for ChatAnalyzer {
    async fn analyze_project(&self, info: &TokenInfo) -> Result<ProjectMetrics> {
        let reply: ProjectReply = self.ask(&project_prompt(info), "project analysis").await?;

        Ok(ProjectMetrics {
            token_info: info.clone(),
            social_score: reply.social_score,
            development_score: reply.development_score,
            community_growth: reply.community_growth,
            market_sentiment: reply.market_sentiment,
            risk_score: reply.risk_score,
            updated_at: Utc::now(),
        })
    }

    async fn predict_price(&self, data: &[MarketSnapshot]) -> Result<PricePrediction> {
        let Some(first) = data.first() else {
            return Err(FluxError::Analysis("no market data provided".to_string()));
        };

        let prompt = prediction_prompt(data, &self.config.predict_time_frame);
        let reply: PredictionReply = self.ask(&prompt, "prediction").await?;

        Ok(PricePrediction {
            symbol: first.symbol.clone(),
            predicted_price: reply.predicted_price,
            confidence: reply.confidence,
            time_frame: self.config.predict_time_frame.clone(),
            factors: reply.factors,
        })
    }

    async fn analyze_sentiment(&self, social_data: &HashMap<String, String>) -> Result<f64> {
        let reply: SentimentReply = self
            .ask(&sentiment_prompt(social_data), "sentiment")
            .await?;
        Ok(reply.sentiment_score)
    }

    async fn detect_scam(&self, project: &ProjectMetrics) -> Result<ScamAnalysis> {
        let reply: ScamReply = self.ask(&scam_prompt(project), "scam analysis").await?;

        Ok(ScamAnalysis {
            scam_probability: reply.scam_probability,
            risk_factors: reply.risk_factors,
            confidence: reply.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_prediction() {
        let reply = "```json\n{\"predicted_price\": 101.5, \"confidence\": 0.82, \"factors\": [\"volume\"], \"reasoning\": \"up\"}\n```";
        let parsed: PredictionReply = parse_reply(reply).unwrap();
        assert_eq!(parsed.predicted_price, 101.5);
        assert_eq!(parsed.confidence, 0.82);
        assert_eq!(parsed.factors, vec!["volume".to_string()]);
    }

    #[test]
    fn test_reply_content_errors() {
        let err = reply_content(r#"{"error": {"message": "quota exceeded"}}"#).unwrap_err();
        assert!(matches!(err, FluxError::Analysis(ref m) if m.contains("quota exceeded")));

        let err = reply_content(r#"{"choices": []}"#).unwrap_err();
        assert!(err.to_string().contains("no response"));

        assert!(reply_content("not json").is_err());
    }

    #[test]
    fn test_reply_content_first_choice() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"sentiment_score\": -0.4}"}}]}"#;
        let content = reply_content(body).unwrap();
        let parsed: SentimentReply = parse_reply(&content).unwrap();
        assert_eq!(parsed.sentiment_score, -0.4);
    }

    #[tokio::test]
    async fn test_unconfigured_is_analysis_error() {
        let analyzer = ChatAnalyzer::new(ChatConfig::default()).unwrap();
        assert!(!analyzer.is_configured());

        let err = analyzer
            .analyze_sentiment(&HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FluxError::Analysis(_)));
    }

    #[tokio::test]
    async fn test_predict_requires_data() {
        let analyzer = ChatAnalyzer::new(ChatConfig {
            api_key: "key".into(),
            ..ChatConfig::default()
        })
        .unwrap();

        let err = analyzer.predict_price(&[]).await.unwrap_err();
        assert!(err.to_string().contains("no market data"));
    }

    #[test]
    fn test_sentiment_prompt_is_ordered() {
        let mut data = HashMap::new();
        data.insert("twitter_followers".to_string(), "1200.00".to_string());
        data.insert("github_stars".to_string(), "80.00".to_string());

        let prompt = sentiment_prompt(&data);
        let github = prompt.find("github_stars").unwrap();
        let twitter = prompt.find("twitter_followers").unwrap();
        assert!(github < twitter);
    }
}
