//! Failure classification for connection faults.
//!
//! Decides whether a fault that ended a connection is worth a reconnect,
//! and which backoff scale applies.

use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::{Fault, TransportError};

/// Backoff scale hint attached to a retriable classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitHint {
    /// Ordinary transient failure.
    Standard,
    /// Server-side backpressure ("try again later").
    Extended,
}

/// Result of classifying a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retriable(WaitHint),
    Fatal,
}

impl Classification {
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

/// Maps a connection fault to a retry decision.
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, fault: &Fault) -> Classification;
}

/// Default policy keyed on websocket close codes.
///
/// | Fault | Classification |
/// |---|---|
/// | abnormal closure (1006) | retriable |
/// | going away (1001) | retriable |
/// | try again later (1013) | retriable, extended wait |
/// | undecodable inbound frame | retriable |
/// | anything else | fatal |
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseCodeClassifier;

impl FailureClassifier for CloseCodeClassifier {
    fn classify(&self, fault: &Fault) -> Classification {
        match fault {
            Fault::Transport(TransportError::Closed { code, .. }) => match code {
                CloseCode::Abnormal | CloseCode::Away => {
                    Classification::Retriable(WaitHint::Standard)
                }
                CloseCode::Again => Classification::Retriable(WaitHint::Extended),
                _ => Classification::Fatal,
            },
            // A malformed frame costs a reconnect cycle rather than the session.
            Fault::Decode(_) => Classification::Retriable(WaitHint::Standard),
            Fault::Transport(_) => Classification::Fatal,
        }
    }
}
