//! Handler for the streaming run.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, info_span, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::handler::TickerHandler;
use crate::stream::{HandlerRegistry, SessionManager, Subscription};
use crate::topic;

/// Load configuration, start the session, and stop it on Ctrl+C.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the session fails.
pub async fn execute(cli: &Cli) -> Result<()> {
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = "json".to_string();
    }
    if !cli.topics.is_empty() {
        config
            .subscriptions
            .push(Subscription::subscribe(cli.topics.iter().cloned()));
    }

    config.init_logging();
    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let subscriptions = config.subscription_registry()?;
    let mut handlers = HandlerRegistry::new();
    for t in subscriptions.topics() {
        if topic::stream_of(t) == topic::TICKERS {
            handlers.register(t, Arc::new(TickerHandler::new(info_span!("ticker", topic = t))));
        } else {
            warn!(topic = t, "No handler available, frames will be discarded");
        }
    }

    let mut session = SessionManager::from_config(&config)?;
    info!(
        url = %session.url(),
        topics = ?subscriptions.topics().collect::<Vec<_>>(),
        "bybit-stream starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });

    let result = session.run(shutdown_rx, &subscriptions, handlers).await;

    let stats = session.stats();
    info!(
        connections = stats.connections,
        reconnects = stats.reconnects,
        frames = stats.frames,
        delivered = stats.delivered,
        handler_failures = stats.handler_failures,
        unroutable = stats.unroutable,
        "bybit-stream stopped"
    );
    result
}
