//! Topic handlers shipped with the crate.

pub mod ticker;

pub use ticker::{TickerData, TickerHandler, TickerMessage};
