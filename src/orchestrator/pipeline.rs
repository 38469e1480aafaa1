//! Per-snapshot decision pipeline and alert responses

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ai::Analyzer;
use crate::collector::MultiSourceCollector;
use crate::config::AppConfig;
use crate::domain::{MarketSnapshot, Order, OrderSide, OrderType, ProjectMetrics};
use crate::error::Result;
use crate::exchange::TradeExecutor;
use crate::persistence::DataStorage;
use crate::risk::{AlertSeverity, PositionBook, RiskAlert, RiskAssessment, RiskEngine, TradeFill};

/// Sentiment below this skips trading
pub const NEGATIVE_SENTIMENT_CUTOFF: f64 = -0.5;
/// Share of the holding sold on a medium alert
pub const REDUCE_FRACTION: f64 = 0.5;

/// Per-platform weights of the social score
const SOCIAL_WEIGHTS: [(&str, f64); 4] = [
    ("twitter_followers", 0.3),
    ("telegram_members", 0.3),
    ("github_stars", 0.2),
    ("reddit_members", 0.2),
];

/// Trading knobs read by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub min_confidence: f64,
    pub scam_threshold: f64,
    pub max_order_amount: f64,
    pub min_order_amount: f64,
    pub price_tolerance: f64,
    pub order_type: OrderType,
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_confidence: config.ai.min_confidence,
            scam_threshold: config.ai.scam_threshold,
            max_order_amount: config.trading.max_order_amount,
            min_order_amount: config.trading.min_order_amount,
            price_tolerance: config.trading.price_tolerance,
            order_type: config.trading.order_type,
        }
    }
}

/// How a snapshot left the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    ScamSuspected { probability: f64 },
    NegativeSentiment { score: f64 },
    LowConfidence { confidence: f64 },
    /// Prediction within the price tolerance band
    NoSignal,
    RiskRejected(RiskAssessment),
    Executed(Order),
}

/// Weighted sum over known platforms; unknown keys are ignored
pub fn calculate_social_score(metrics: &HashMap<String, f64>) -> f64 {
    SOCIAL_WEIGHTS
        .iter()
        .filter_map(|(platform, weight)| metrics.get(*platform).map(|v| v * weight))
        .sum()
}

/// Render metrics as text for sentiment analysis
pub fn social_metrics_to_text(metrics: &HashMap<String, f64>) -> HashMap<String, String> {
    metrics
        .iter()
        .map(|(k, v)| (k.clone(), format!("{:.2}", v)))
        .collect()
}

/// Buy above the tolerance band, sell below it, nothing inside
pub fn determine_order_side(predicted: f64, current: f64, tolerance: f64) -> Option<OrderSide> {
    if predicted > current * (1.0 + tolerance) {
        Some(OrderSide::Buy)
    } else if predicted < current * (1.0 - tolerance) {
        Some(OrderSide::Sell)
    } else {
        None
    }
}

/// Collaborators shared by the run loop and the spawned snapshot handlers
pub struct Pipeline {
    pub(crate) collector: Arc<MultiSourceCollector>,
    pub(crate) storage: Arc<dyn DataStorage>,
    pub(crate) analyzer: Arc<dyn Analyzer>,
    pub(crate) risk: Arc<RiskEngine>,
    pub(crate) executor: Arc<dyn TradeExecutor>,
    pub(crate) book: Option<Arc<PositionBook>>,
    pub(crate) settings: PipelineSettings,
    /// Held from the risk check until the fill is recorded, so concurrent
    /// handlers are judged against each other's fills
    pub(crate) trade_gate: Mutex<()>,
}

impl Pipeline {
    fn order_amount(&self) -> f64 {
        self.settings
            .max_order_amount
            .max(self.settings.min_order_amount)
    }

    /// Run one snapshot through collection, analysis, risk and execution
    pub async fn handle_market_data(&self, snapshot: MarketSnapshot) -> Result<PipelineOutcome> {
        let symbol = snapshot.symbol.clone();

        self.storage.save_market_snapshot(&snapshot).await?;
        if let Some(book) = &self.book {
            book.mark(&symbol, snapshot.price).await;
        }

        let token_info = self.collector.collect_token_info(&symbol).await?;
        if let Err(e) = self.storage.save_token_info(&token_info).await {
            warn!(%symbol, error = %e, "failed to save token info");
        }

        let social = match self.collector.collect_social_metrics(&symbol).await {
            Ok(metrics) => metrics,
            Err(e) if e.is_not_found() => {
                debug!(%symbol, "no social metrics, skipping scam detection");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };

        if !social.is_empty() {
            let metrics =
                ProjectMetrics::from_social_score(token_info, calculate_social_score(&social));
            if let Err(e) = self.storage.save_project_metrics(&metrics).await {
                warn!(%symbol, error = %e, "failed to save project metrics");
            }

            let scam = self.analyzer.detect_scam(&metrics).await?;
            if scam.scam_probability > self.settings.scam_threshold {
                warn!(%symbol, probability = scam.scam_probability, "high scam probability detected");
                return Ok(PipelineOutcome::ScamSuspected {
                    probability: scam.scam_probability,
                });
            }
        }

        let sentiment = self
            .analyzer
            .analyze_sentiment(&social_metrics_to_text(&social))
            .await?;
        if sentiment < NEGATIVE_SENTIMENT_CUTOFF {
            warn!(%symbol, sentiment, "negative market sentiment");
            return Ok(PipelineOutcome::NegativeSentiment { score: sentiment });
        }

        let prediction = self
            .analyzer
            .predict_price(std::slice::from_ref(&snapshot))
            .await?;
        if prediction.confidence < self.settings.min_confidence {
            debug!(%symbol, confidence = prediction.confidence, "prediction below confidence floor");
            return Ok(PipelineOutcome::LowConfidence {
                confidence: prediction.confidence,
            });
        }

        let Some(side) = determine_order_side(
            prediction.predicted_price,
            snapshot.price,
            self.settings.price_tolerance,
        ) else {
            debug!(
                %symbol,
                predicted = prediction.predicted_price,
                current = snapshot.price,
                "prediction inside tolerance band"
            );
            return Ok(PipelineOutcome::NoSignal);
        };

        let order = Order::new(
            &symbol,
            side,
            self.order_amount(),
            prediction.predicted_price,
            self.settings.order_type,
        );

        let _gate = self.trade_gate.lock().await;
        let assessment = self.risk.check_trade_risk(&order).await;
        if !assessment.is_acceptable {
            info!(
                %symbol,
                risk_level = assessment.risk_level,
                factors = ?assessment.risk_factors,
                "order rejected by risk engine"
            );
            return Ok(PipelineOutcome::RiskRejected(assessment));
        }

        let order = self.place_and_record(order).await?;
        Ok(PipelineOutcome::Executed(order))
    }

    /// Place an order and feed the fill back into the book and daily stats
    pub async fn execute(&self, order: Order) -> Result<Order> {
        let _gate = self.trade_gate.lock().await;
        self.place_and_record(order).await
    }

    async fn place_and_record(&self, mut order: Order) -> Result<Order> {
        self.executor.place_order(&mut order).await?;

        let realized_pnl = match &self.book {
            Some(book) => book.apply_fill(&order, order.price).await,
            None => 0.0,
        };

        self.risk
            .record_trade(TradeFill {
                symbol: order.symbol.clone(),
                notional: order.value(),
                realized_pnl,
            })
            .await;

        info!(
            symbol = %order.symbol,
            side = %order.side,
            amount = order.amount,
            price = order.price,
            order_id = ?order.order_id,
            "order executed"
        );
        Ok(order)
    }

    /// Respond to a monitor alert; returns the order placed, if any
    pub async fn handle_risk_alert(&self, alert: &RiskAlert) -> Result<Option<Order>> {
        match alert.severity {
            AlertSeverity::High => {
                warn!(symbol = %alert.symbol, description = %alert.description, "emergency close");
                self.sell_fraction(&alert.symbol, 1.0).await
            }
            AlertSeverity::Medium => {
                warn!(symbol = %alert.symbol, description = %alert.description, "reducing position");
                self.sell_fraction(&alert.symbol, REDUCE_FRACTION).await
            }
            AlertSeverity::Low => {
                warn!(symbol = %alert.symbol, description = %alert.description, "risk alert");
                Ok(None)
            }
        }
    }

    async fn sell_fraction(&self, symbol: &str, fraction: f64) -> Result<Option<Order>> {
        let balance = self.executor.get_balance(symbol).await?;
        if balance <= 0.0 {
            debug!(%symbol, "no holding to sell");
            return Ok(None);
        }

        let mut order = Order::sell_market(symbol, balance * fraction);
        if let Some(book) = &self.book {
            if let Some(mark) = book.mark_price(symbol).await {
                order.price = mark;
            }
        }

        self.execute(order).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_score_weights() {
        let metrics = HashMap::from([
            ("twitter_followers".to_string(), 1000.0),
            ("telegram_members".to_string(), 500.0),
            ("github_stars".to_string(), 100.0),
            ("reddit_members".to_string(), 50.0),
            ("discord_members".to_string(), 9999.0),
        ]);

        // 300 + 150 + 20 + 10
        assert!((calculate_social_score(&metrics) - 480.0).abs() < 1e-9);
        assert_eq!(calculate_social_score(&HashMap::new()), 0.0);
    }

    #[test]
    fn test_order_side_band() {
        assert_eq!(determine_order_side(103.0, 100.0, 0.02), Some(OrderSide::Buy));
        assert_eq!(determine_order_side(97.0, 100.0, 0.02), Some(OrderSide::Sell));
        assert_eq!(determine_order_side(101.0, 100.0, 0.02), None);
        assert_eq!(determine_order_side(102.0, 100.0, 0.02), None);
    }

    #[test]
    fn test_metrics_to_text() {
        let text = social_metrics_to_text(&HashMap::from([("github_stars".to_string(), 12.345)]));
        assert_eq!(text["github_stars"], "12.35");
    }

    use crate::ai::MockAnalyzer;
    use crate::domain::OrderStatus;
    use crate::error::FluxError;
    use crate::exchange::MockTradeExecutor;
    use crate::persistence::MemoryStorage;
    use crate::risk::RiskParameters;

    fn pipeline(executor: MockTradeExecutor, storage: Arc<MemoryStorage>) -> Pipeline {
        Pipeline {
            collector: Arc::new(MultiSourceCollector::new(Vec::new())),
            storage,
            analyzer: Arc::new(MockAnalyzer::new()),
            risk: Arc::new(RiskEngine::new(RiskParameters {
                max_position_size: 10000.0,
                max_loss_per_trade: 1000.0,
                max_daily_loss: 3000.0,
                max_leverage: 3.0,
                min_liquidity: 5000.0,
            })),
            executor: Arc::new(executor),
            book: Some(Arc::new(PositionBook::new())),
            settings: PipelineSettings {
                min_confidence: 0.7,
                scam_threshold: 0.5,
                max_order_amount: 1.0,
                min_order_amount: 0.01,
                price_tolerance: 0.02,
                order_type: OrderType::Limit,
            },
            trade_gate: Mutex::new(()),
        }
    }

    #[tokio::test]
    async fn test_rejected_order_is_not_recorded() {
        let mut executor = MockTradeExecutor::new();
        executor
            .expect_place_order()
            .times(1)
            .returning(|_| Err(FluxError::OrderRejected("exchange down".to_string())));
        let pipeline = pipeline(executor, Arc::new(MemoryStorage::new()));

        let err = pipeline
            .execute(Order::buy_limit("BTCUSDT", 1.0, 100.0))
            .await
            .unwrap_err();

        assert!(matches!(err, FluxError::OrderRejected(_)));
        assert_eq!(pipeline.risk.daily_stats().await.trade_count, 0);
    }

    #[tokio::test]
    async fn test_fill_price_from_executor_is_recorded() {
        let mut executor = MockTradeExecutor::new();
        executor.expect_place_order().returning(|order: &mut Order| {
            order.price = 101.0;
            order.status = OrderStatus::Filled;
            order.order_id = Some("ord-1".to_string());
            Ok(())
        });
        let pipeline = pipeline(executor, Arc::new(MemoryStorage::new()));

        let order = pipeline
            .execute(Order::buy_limit("BTCUSDT", 2.0, 100.0))
            .await
            .unwrap();

        assert_eq!(order.order_id.as_deref(), Some("ord-1"));
        let stats = pipeline.risk.daily_stats().await;
        assert_eq!(stats.trade_count, 1);
        assert_eq!(stats.trading_volume, 202.0);

        let book = pipeline.book.as_ref().unwrap();
        assert_eq!(book.mark_price("BTCUSDT").await, Some(101.0));
    }

    #[tokio::test]
    async fn test_missing_token_info_stops_after_saving_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        let pipeline = pipeline(MockTradeExecutor::new(), storage.clone());

        let err = pipeline
            .handle_market_data(MarketSnapshot::new("BTCUSDT", 100.0))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(storage.snapshot_count("BTCUSDT"), 1);
    }
}
