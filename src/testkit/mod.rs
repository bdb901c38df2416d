//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] - In-memory [`Transport`](crate::stream::Transport) with
//!   scripted connections and a probe recording everything sent.
//! - [`handler`] - Message handlers that record or fail.
//! - [`frames`] - Builders for inbound frames.
//! - [`config`] - Canonical session settings for tests.

pub mod config;
pub mod frames;
pub mod handler;
pub mod transport;
