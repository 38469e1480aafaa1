use quantaflux::ai::ChatAnalyzer;
use quantaflux::collector::{BinanceDataSource, DataSource, MultiSourceCollector};
use quantaflux::config::{AppConfig, LoggingConfig};
use quantaflux::coordination::{wait_for_os_signal, Shutdown, ShutdownSignal};
use quantaflux::error::{FluxError, Result};
use quantaflux::exchange::build_executor;
use quantaflux::orchestrator::{QuantSystem, SystemSettings};
use quantaflux::persistence::{DataStorage, MemoryStorage, PostgresStorage};
use quantaflux::risk::{PositionBook, RiskEngine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info,quantaflux=debug,sqlx=warn"));

    let log_dir = std::env::var("QUANTAFLUX_LOG_DIR")
        .ok()
        .or_else(|| config.dir.clone());

    // `rolling::daily` panics if it cannot create the first file, so check
    // the directory before handing it over
    let file_layer = log_dir.as_deref().and_then(|dir| {
        let marker = std::path::Path::new(dir).join(".quantaflux_write_test");
        let writable = std::fs::create_dir_all(dir).is_ok()
            && std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&marker)
                .is_ok();

        if !writable {
            eprintln!(
                "Warning: Could not write to log directory {}, file logging disabled",
                dir
            );
            return None;
        }
        let _ = std::fs::remove_file(&marker);

        let file_appender = tracing_appender::rolling::daily(dir, "quantaflux.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Flushes on drop; lives for the whole process
        Box::leak(Box::new(guard));

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
    });

    let (console_plain, console_json) = if config.json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_target(true)))
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_plain)
        .with(console_json)
        .with(file_layer)
        .init();
}

pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

pub fn load_config(dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    if let Err(errors) = config.validate() {
        return Err(FluxError::InvalidParameter(errors.join("; ")));
    }
    Ok(config)
}

fn build_collector(config: &AppConfig) -> Result<MultiSourceCollector> {
    let binance: Arc<dyn DataSource> =
        Arc::new(BinanceDataSource::with_base_url(&config.collector.binance_url)?);
    Ok(MultiSourceCollector::new(vec![binance])
        .with_channel_capacity(config.collector.channel_capacity))
}

async fn build_storage(config: &AppConfig) -> Result<Arc<dyn DataStorage>> {
    match &config.database.url {
        Some(url) => {
            let storage = PostgresStorage::new(url, config.database.max_connections).await?;
            Ok(Arc::new(storage))
        }
        None => {
            warn!("no database configured, using in-memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

/// Forward SIGINT/SIGTERM into the shutdown controller
fn spawn_signal_listener(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        wait_for_os_signal().await;
        shutdown.request_shutdown(ShutdownSignal::Graceful);
    });
}

pub async fn run_system(mut config: AppConfig, force_dry_run: bool) -> Result<()> {
    if force_dry_run {
        config.exchange.dry_run = true;
    }

    let collector = Arc::new(build_collector(&config)?);
    let storage = build_storage(&config).await?;
    let analyzer = Arc::new(ChatAnalyzer::new(config.ai.chat_config())?);
    if !analyzer.is_configured() {
        warn!("AI API key not configured; every analysis will fail");
    }
    let executor = build_executor(&config.exchange)?;

    let book = Arc::new(PositionBook::new());
    let risk = Arc::new(
        RiskEngine::try_new(config.risk)?
            .with_monitor_config(config.monitor.clone())?
            .with_position_provider(book.clone()),
    );

    info!(
        sources = ?collector.source_names(),
        dry_run = executor.is_dry_run(),
        exchange = %executor.kind(),
        "components initialized"
    );

    let system = QuantSystem::new(
        SystemSettings::from(&config),
        collector,
        storage,
        analyzer,
        risk,
        executor,
    )
    .with_position_book(book);

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    system.run(shutdown.token()).await
}

pub async fn run_watch(config: &AppConfig, symbols: Vec<String>, interval: Duration) -> Result<()> {
    let symbols = if symbols.is_empty() {
        config.symbols.clone()
    } else {
        symbols
    };

    let collector = build_collector(config)?;
    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    let mut subscription =
        collector.subscribe_to_market_data(&symbols, interval, shutdown.token())?;
    println!(
        "Watching {} every {}ms (Ctrl+C to stop)",
        symbols.join(", "),
        interval.as_millis()
    );

    while let Some(snapshot) = subscription.recv().await {
        println!(
            "{} {:<12} price={:<14.6} vol24h={:<16.2} chg24h={:+.2}%",
            snapshot.timestamp.format("%H:%M:%S"),
            snapshot.symbol,
            snapshot.price,
            snapshot.volume_24h,
            snapshot.price_change_24h
        );
    }

    if subscription.dropped() > 0 {
        println!("{} snapshots dropped", subscription.dropped());
    }
    Ok(())
}
