//! Resilient Bybit v5 websocket streaming.
//!
//! A [`SessionManager`](stream::SessionManager) keeps one logical stream
//! alive against a Bybit endpoint: it dials, sends a heartbeat, replays the
//! registered subscriptions, and routes every inbound frame to the handler
//! registered for its topic. Dropped connections are classified by close
//! code and redialed with linear backoff up to an attempt ceiling. A
//! shutdown signal closes the connection with a normal close handshake.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface for the bundled binary
//! - [`config`] - TOML configuration for endpoint, timing, logging and subscriptions
//! - [`stream`] - Session state machine, transport, classification, dispatch
//! - [`handler`] - Ready-made topic handlers (tickers)
//! - [`topic`] - Topic name helpers
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bybit_stream::handler::TickerHandler;
//! use bybit_stream::stream::{
//!     HandlerRegistry, SessionManager, SessionSettings, Subscription, SubscriptionRegistry,
//!     WebSocketTransport, Endpoint,
//! };
//! use bybit_stream::topic;
//!
//! # async fn run() -> bybit_stream::error::Result<()> {
//! let btc = topic::tickers("BTCUSDT");
//! let subscriptions =
//!     SubscriptionRegistry::from_subscriptions([Subscription::subscribe([btc.as_str()])])?;
//! let handlers = HandlerRegistry::new()
//!     .with(btc.as_str(), Arc::new(TickerHandler::new(tracing::Span::current())));
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let mut session = SessionManager::new(
//!     WebSocketTransport::new(),
//!     Endpoint::default().url()?,
//!     SessionSettings::default(),
//! )?;
//! session.run(shutdown_rx, &subscriptions, handlers).await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod stream;
pub mod topic;

/// Shared test utilities.
///
/// Available in unit tests and, with the `testkit` feature, integration tests.
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
