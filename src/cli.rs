use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quantaflux")]
#[command(version)]
#[command(about = "Crypto market monitoring and risk-gated trading agent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration directory (default.toml plus $QUANTAFLUX_ENV overrides)
    #[arg(short, long, default_value = "config", env = "QUANTAFLUX_CONFIG_DIR")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full collection, analysis and trading loop (default)
    Run {
        /// Force paper execution regardless of configuration
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the market data subscription without analysis or trading
    Watch {
        /// Symbols to watch (defaults to the configured list)
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Poll interval in milliseconds (defaults to refresh_interval_ms)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}
