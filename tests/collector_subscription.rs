use async_trait::async_trait;
use quantaflux::collector::{DataSource, MultiSourceCollector};
use quantaflux::coordination::{Shutdown, ShutdownSignal};
use quantaflux::domain::{MarketSnapshot, TokenInfo};
use quantaflux::error::{FluxError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source with fixed behavior that counts its calls
struct FakeSource {
    name: &'static str,
    price: Option<f64>,
    social: Option<HashMap<String, f64>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn healthy(name: &'static str, price: f64) -> Arc<Self> {
        Arc::new(Self {
            name,
            price: Some(price),
            social: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            price: None,
            social: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn social(name: &'static str, metrics: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            name,
            price: None,
            social: Some(
                metrics
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FakeSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn collect_token_info(&self, symbol: &str) -> Result<TokenInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.price {
            Some(_) => Ok(TokenInfo::new(symbol, self.name)),
            None => Err(FluxError::source_failure(self.name, "unavailable")),
        }
    }

    async fn collect_market_data(&self, symbol: &str) -> Result<MarketSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.price {
            Some(price) => Ok(MarketSnapshot::new(symbol, price)),
            None => Err(FluxError::source_failure(self.name, "unavailable")),
        }
    }

    async fn collect_social_metrics(&self, _symbol: &str) -> Result<HashMap<String, f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.social
            .clone()
            .ok_or_else(|| FluxError::source_failure(self.name, "no social feed"))
    }
}

fn collector(sources: Vec<Arc<FakeSource>>) -> MultiSourceCollector {
    MultiSourceCollector::new(
        sources
            .into_iter()
            .map(|s| s as Arc<dyn DataSource>)
            .collect(),
    )
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn fallback_returns_second_source_when_first_fails() {
    let a = FakeSource::failing("a");
    let b = FakeSource::healthy("b", 42.0);
    let c = FakeSource::healthy("c", 99.0);
    let collector = collector(vec![a.clone(), b.clone(), c.clone()]);

    let snapshot = collector.collect_market_data("BTCUSDT").await.unwrap();

    assert_eq!(snapshot.price, 42.0);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 0, "sources after the first success are not queried");

    let info = collector.collect_token_info("BTCUSDT").await.unwrap();
    assert_eq!(info.name, "b");
}

#[tokio::test]
async fn all_sources_failing_is_not_found() {
    let collector = collector(vec![FakeSource::failing("a"), FakeSource::failing("b")]);

    let err = collector.collect_market_data("BTCUSDT").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(collector
        .collect_token_info("BTCUSDT")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn social_metrics_merge_and_partial_failure() {
    let collector = collector(vec![
        FakeSource::social("twitter", &[("twitter_followers", 1500.0)]),
        FakeSource::failing("broken"),
        FakeSource::social("github", &[("github_stars", 320.0), ("reddit_members", 80.0)]),
    ]);

    let merged = collector.collect_social_metrics("PEPE").await.unwrap();

    assert_eq!(merged.len(), 3);
    assert_eq!(merged["twitter_followers"], 1500.0);
    assert_eq!(merged["github_stars"], 320.0);
    assert_eq!(merged["reddit_members"], 80.0);
}

#[tokio::test(start_paused = true)]
async fn full_channel_drops_and_counts() {
    let source = FakeSource::healthy("a", 1.0);
    let collector = collector(vec![source]).with_channel_capacity(1);
    let shutdown = Shutdown::new();

    let mut subscription = collector
        .subscribe_to_market_data(
            &symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]),
            Duration::from_secs(1),
            shutdown.token(),
        )
        .unwrap();

    // One tick: three snapshots into a channel of one
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(subscription.dropped(), 2);

    shutdown.request_shutdown(ShutdownSignal::Internal);

    let buffered = subscription.recv().await.expect("buffered snapshot survives");
    assert_eq!(buffered.symbol, "BTCUSDT");
    assert!(subscription.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn first_tick_waits_one_interval() {
    let collector = collector(vec![FakeSource::healthy("a", 1.0)]);
    let shutdown = Shutdown::new();

    let mut subscription = collector
        .subscribe_to_market_data(&symbols(&["BTCUSDT"]), Duration::from_secs(10), shutdown.token())
        .unwrap();

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(subscription.try_recv().is_none());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(subscription.try_recv().is_some());

    shutdown.request_shutdown(ShutdownSignal::Internal);
    subscription.join().await;
    assert_eq!(subscription.producer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn channel_closes_only_after_every_producer_exits() {
    let collector = collector(vec![
        FakeSource::healthy("a", 1.0),
        FakeSource::healthy("b", 2.0),
        FakeSource::failing("c"),
    ]);
    let shutdown = Shutdown::new();

    let mut subscription = collector
        .subscribe_to_market_data(&symbols(&["BTCUSDT"]), Duration::from_secs(5), shutdown.token())
        .unwrap();
    assert_eq!(subscription.producer_count(), 3);

    tokio::time::sleep(Duration::from_secs(6)).await;
    shutdown.request_shutdown(ShutdownSignal::Internal);

    let mut received = Vec::new();
    while let Some(snapshot) = subscription.recv().await {
        received.push(snapshot.price);
    }
    received.sort_by(|a, b| a.partial_cmp(b).unwrap());

    // The failing source contributes nothing; the others one tick each
    assert_eq!(received, vec![1.0, 2.0]);
    assert_eq!(subscription.dropped(), 0);
}

/// Source whose every call takes `delay` to answer
struct SlowSource {
    name: &'static str,
    delay: Duration,
    social: HashMap<String, f64>,
    calls: AtomicUsize,
}

impl SlowSource {
    fn new(name: &'static str, delay: Duration, metrics: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay,
            social: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DataSource for SlowSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn collect_token_info(&self, symbol: &str) -> Result<TokenInfo> {
        tokio::time::sleep(self.delay).await;
        Ok(TokenInfo::new(symbol, self.name))
    }

    async fn collect_market_data(&self, symbol: &str) -> Result<MarketSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(MarketSnapshot::new(symbol, 7.0))
    }

    async fn collect_social_metrics(&self, _symbol: &str) -> Result<HashMap<String, f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.social.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_fetch_still_publishes_then_closes() {
    let source = SlowSource::new("slow", Duration::from_secs(3), &[]);
    let collector = MultiSourceCollector::new(vec![source.clone() as Arc<dyn DataSource>]);
    let shutdown = Shutdown::new();
    let start = tokio::time::Instant::now();

    let mut subscription = collector
        .subscribe_to_market_data(&symbols(&["BTCUSDT"]), Duration::from_secs(1), shutdown.token())
        .unwrap();

    // First tick at 1s starts a fetch that runs until 4s
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    shutdown.request_shutdown(ShutdownSignal::Internal);

    let snapshot = subscription.recv().await.expect("in-flight fetch is published");
    assert_eq!(snapshot.price, 7.0);
    assert!(start.elapsed() >= Duration::from_secs(4));

    assert!(subscription.recv().await.is_none());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1, "no fetch after shutdown");
    assert_eq!(subscription.dropped(), 0);
}

#[tokio::test(start_paused = true)]
async fn social_metrics_sources_are_queried_in_parallel() {
    let delay = Duration::from_secs(5);
    let twitter = SlowSource::new("twitter", delay, &[("twitter", 1.0)]);
    let reddit = SlowSource::new("reddit", delay, &[("reddit", 2.0)]);
    let collector = MultiSourceCollector::new(vec![
        twitter.clone() as Arc<dyn DataSource>,
        reddit.clone() as Arc<dyn DataSource>,
    ]);

    let start = tokio::time::Instant::now();
    let merged = collector.collect_social_metrics("PEPE").await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(
        merged,
        HashMap::from([("twitter".to_string(), 1.0), ("reddit".to_string(), 2.0)])
    );
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "sources ran one after another: {:?}", elapsed);
    assert_eq!(twitter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(reddit.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_social_source_does_not_hold_back_fast_one() {
    let fast = SlowSource::new("fast", Duration::from_secs(1), &[("twitter", 1.0)]);
    let slow = SlowSource::new("slow", Duration::from_secs(8), &[("reddit", 2.0)]);
    let collector = MultiSourceCollector::new(vec![
        slow as Arc<dyn DataSource>,
        fast as Arc<dyn DataSource>,
    ]);

    let start = tokio::time::Instant::now();
    let merged = collector.collect_social_metrics("PEPE").await.unwrap();

    // Waits for the slowest source only
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(8) && elapsed < Duration::from_secs(9));
    assert_eq!(merged.len(), 2);
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let collector = collector(vec![FakeSource::healthy("a", 1.0)]);
    let shutdown = Shutdown::new();

    let err = collector
        .subscribe_to_market_data(&symbols(&["BTCUSDT"]), Duration::ZERO, shutdown.token())
        .unwrap_err();
    assert!(matches!(err, FluxError::InvalidParameter(_)));
}
