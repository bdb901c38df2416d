//! Command-line interface definitions.

pub mod run;

use clap::Parser;
use std::path::PathBuf;

/// Stream Bybit v5 topics and log every ticker.
#[derive(Parser, Debug)]
#[command(name = "bybit-stream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Ticker topic to subscribe to, e.g. `tickers.BTCUSDT` (repeatable).
    /// Added to the subscriptions from the config file.
    #[arg(short, long = "topic")]
    pub topics: Vec<String>,

    /// Override the log level (e.g. debug, info, warn)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}
