use clap::Parser;
use quantaflux::cli::{Cli, Commands};
use quantaflux::error::Result;
use std::time::Duration;
use tracing::error;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, load_config, run_system, run_watch};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => {
            init_logging_simple();
            let config = load_config(&cli.config)?;
            println!(
                "Configuration OK: {} symbols, refresh every {}ms, exchange {} (dry run: {})",
                config.symbols.len(),
                config.refresh_interval_ms,
                config.exchange.exchange,
                config.exchange.dry_run
            );
        }
        Some(Commands::Watch {
            symbols,
            interval_ms,
        }) => {
            init_logging_simple();
            let config = load_config(&cli.config)?;
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.refresh_interval());
            run_watch(&config, symbols, interval).await?;
        }
        Some(Commands::Run { dry_run }) => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            if let Err(e) = run_system(config, dry_run).await {
                error!(error = %e, "system error");
                return Err(e);
            }
        }
        None => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            if let Err(e) = run_system(config, false).await {
                error!(error = %e, "system error");
                return Err(e);
            }
        }
    }

    Ok(())
}
