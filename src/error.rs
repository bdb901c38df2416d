use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures reported by a [`Transport`](crate::stream::Transport) or one of
/// its connection halves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established at all.
    #[error("dial failed: {0}")]
    Dial(String),

    /// The connection ended, either with a close frame from the peer or
    /// without one (reported as [`CloseCode::Abnormal`]).
    #[error("connection closed with code {code}: {reason}")]
    Closed { code: CloseCode, reason: String },

    /// Any other protocol or I/O failure on an established connection.
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Shorthand for a connection dropped without a close handshake.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::Closed {
            code: CloseCode::Abnormal,
            reason: reason.into(),
        }
    }

    /// The close code carried by this error, if it is a closure.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Closed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A fault that ends the current connection and is handed to the
/// failure classifier.
#[derive(Error, Debug)]
pub enum Fault {
    /// Reading, heartbeat, or subscription writes failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An inbound frame was not a valid JSON object.
    #[error("failed to decode inbound frame: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Terminal session failures surfaced from
/// [`SessionManager::run`](crate::stream::SessionManager::run).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to connect to {url}: {source}")]
    Dial {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("connection terminated: {0}")]
    NonRetriable(#[source] Fault),

    #[error("giving up after {attempts} reconnection attempts: {last}")]
    RetryCeilingExceeded {
        attempts: u32,
        #[source]
        last: Fault,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abnormal_helper_sets_close_code() {
        let err = TransportError::abnormal("reset");
        assert_eq!(err.close_code(), Some(CloseCode::Abnormal));
    }

    #[test]
    fn non_closure_errors_have_no_close_code() {
        assert_eq!(TransportError::Dial("refused".into()).close_code(), None);
        assert_eq!(TransportError::Other("tls".into()).close_code(), None);
    }

    #[test]
    fn retry_ceiling_message_names_attempts_and_cause() {
        let err = SessionError::RetryCeilingExceeded {
            attempts: 10,
            last: Fault::Transport(TransportError::abnormal("peer vanished")),
        };
        let msg = err.to_string();
        assert!(msg.contains("10 reconnection attempts"));
        assert!(msg.contains("peer vanished"));
    }

    #[test]
    fn config_errors_convert_into_crate_error() {
        let err: Error = ConfigError::MissingField { field: "host" }.into();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { field: "host" })
        ));
        assert_eq!(err.to_string(), "missing required field: host");
    }
}
