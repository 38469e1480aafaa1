use quantaflux::coordination::{Shutdown, ShutdownSignal};
use quantaflux::domain::Order;
use quantaflux::risk::{
    AlertSeverity, MonitorConfig, PositionBook, RiskAlert, RiskEngine, RiskParameters, TradeFill,
};
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn params() -> RiskParameters {
    RiskParameters {
        max_position_size: 10000.0,
        max_loss_per_trade: 1000.0,
        max_daily_loss: 3000.0,
        max_leverage: 3.0,
        min_liquidity: 5000.0,
    }
}

fn losing_fill() -> TradeFill {
    TradeFill {
        symbol: "BTCUSDT".to_string(),
        notional: 2000.0,
        realized_pnl: -250.0,
    }
}

#[tokio::test(start_paused = true)]
async fn daily_stats_reset_at_each_day_boundary() {
    let engine = RiskEngine::new(params());
    let shutdown = Shutdown::new();
    let _alerts = engine.monitor_positions(shutdown.token());

    engine.record_trade(losing_fill()).await;
    engine.record_trade(losing_fill()).await;

    tokio::time::sleep(DAY - Duration::from_secs(60)).await;
    let stats = engine.daily_stats().await;
    assert_eq!(stats.trade_count, 2, "no reset before the boundary");
    assert_eq!(stats.total_loss, 500.0);

    tokio::time::sleep(Duration::from_secs(120)).await;
    let stats = engine.daily_stats().await;
    assert_eq!(stats.trade_count, 0);
    assert_eq!(stats.trading_volume, 0.0);
    assert_eq!(stats.total_loss, 0.0);
    assert_eq!(stats.window_index, 1);

    engine.record_trade(losing_fill()).await;
    tokio::time::sleep(DAY).await;
    let stats = engine.daily_stats().await;
    assert_eq!(stats.trade_count, 0);
    assert_eq!(stats.window_index, 2);

    shutdown.request_shutdown(ShutdownSignal::Internal);
}

#[tokio::test(start_paused = true)]
async fn two_monitors_reset_once_per_boundary() {
    let engine = RiskEngine::new(params());
    let shutdown = Shutdown::new();
    let _first = engine.monitor_positions(shutdown.token());
    let _second = engine.monitor_positions(shutdown.token());

    tokio::time::sleep(DAY + Duration::from_secs(1)).await;
    engine.record_trade(losing_fill()).await;

    // Both monitors have already seen this boundary
    tokio::time::sleep(Duration::from_secs(60)).await;
    let stats = engine.daily_stats().await;
    assert_eq!(stats.window_index, 1);
    assert_eq!(stats.trade_count, 1);

    shutdown.request_shutdown(ShutdownSignal::Internal);
}

#[tokio::test(start_paused = true)]
async fn monitor_alerts_on_losing_positions() {
    let book = Arc::new(PositionBook::new());
    book.apply_fill(&Order::buy_limit("BTCUSDT", 1.0, 60000.0), 60000.0)
        .await;
    book.apply_fill(&Order::buy_limit("ETHUSDT", 10.0, 3000.0), 3000.0)
        .await;

    // BTC -12000 (high), ETH -500 (within limit)
    book.mark("BTCUSDT", 48000.0).await;
    book.mark("ETHUSDT", 2950.0).await;

    let engine = RiskEngine::new(params())
        .with_monitor_config(MonitorConfig {
            poll_interval: Duration::from_secs(5),
            ..MonitorConfig::default()
        })
        .unwrap()
        .with_position_provider(book.clone());

    let shutdown = Shutdown::new();
    let mut alerts = engine.monitor_positions(shutdown.token());

    let alert: RiskAlert = tokio::time::timeout(Duration::from_secs(6), alerts.recv())
        .await
        .expect("alert within one poll")
        .expect("channel open");

    assert_eq!(alert.symbol, "BTCUSDT");
    assert_eq!(alert.severity, AlertSeverity::High);
    assert_eq!(alert.alert_type, RiskAlert::POSITION_LOSS);
    assert!(alerts.try_recv().is_err(), "ETH loss is within the limit");

    shutdown.request_shutdown(ShutdownSignal::Internal);
}

#[tokio::test(start_paused = true)]
async fn full_alert_channel_drops_new_alerts() {
    let book = Arc::new(PositionBook::new());
    book.apply_fill(&Order::buy_limit("SOLUSDT", 100.0, 200.0), 200.0)
        .await;
    book.mark("SOLUSDT", 120.0).await; // -8000, medium

    let engine = RiskEngine::new(params())
        .with_monitor_config(MonitorConfig {
            poll_interval: Duration::from_secs(1),
            alert_buffer: 2,
            ..MonitorConfig::default()
        })
        .unwrap()
        .with_position_provider(book);

    let shutdown = Shutdown::new();
    let mut alerts = engine.monitor_positions(shutdown.token());

    // Five polls into a buffer of two
    tokio::time::sleep(Duration::from_millis(5500)).await;
    assert_eq!(engine.alerts_dropped(), 3);

    let first = alerts.recv().await.unwrap();
    assert_eq!(first.severity, AlertSeverity::Medium);

    shutdown.request_shutdown(ShutdownSignal::Internal);
}

#[tokio::test]
async fn alert_channel_closes_after_shutdown() {
    let poll = Duration::from_millis(50);
    let engine = RiskEngine::new(params())
        .with_monitor_config(MonitorConfig {
            poll_interval: poll,
            ..MonitorConfig::default()
        })
        .unwrap();
    let shutdown = Shutdown::new();
    let mut alerts = engine.monitor_positions(shutdown.token());

    shutdown.request_shutdown(ShutdownSignal::Graceful);

    let closed = tokio::time::timeout(poll + Duration::from_millis(200), alerts.recv())
        .await
        .expect("channel should close within the poll interval plus margin");
    assert!(closed.is_none());
}

#[tokio::test]
async fn concurrent_parameter_updates_never_tear() {
    let engine = Arc::new(RiskEngine::new(params()));
    let tight = RiskParameters {
        max_position_size: 500.0,
        max_loss_per_trade: 50.0,
        max_daily_loss: 100.0,
        max_leverage: 1.0,
        min_liquidity: 100.0,
    };

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let next = if i % 2 == 0 { tight } else { params() };
                engine.set_risk_parameters(next).await.unwrap();
            }
        })
    };

    for _ in 0..200 {
        let seen = engine.risk_parameters().await;
        assert!(seen == params() || seen == tight, "observed a mixed parameter set");

        let order = Order::buy_limit("BTCUSDT", 1.0, 1000.0);
        let assessment = engine.check_trade_risk(&order).await;
        assert!(assessment.risk_level >= 0.0);
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
}
