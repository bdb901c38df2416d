//! Configuration modules.

pub mod logging;
pub mod settings;
pub mod stream;

pub use logging::LoggingConfig;
pub use settings::Config;
pub use stream::{ReconnectionConfig, StreamConfig};
