//! Transport port for the streaming session.
//!
//! A [`Transport`] dials one bidirectional framed connection and hands back
//! its two halves: a [`FrameSink`] owned by the supervising loop (the only
//! writer) and a [`FrameSource`] moved into the read task (the only
//! reader). The websocket implementation lives in
//! [`super::websocket`]; tests use the scripted transport from the testkit.

use async_trait::async_trait;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::TransportError;

/// One data frame exchanged over the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Raw bytes of the frame payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Write half of a live connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one data frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Send a close control frame, starting the close handshake.
    async fn send_close(&mut self, code: CloseCode, reason: &str) -> Result<(), TransportError>;

    /// Close the connection unconditionally. Errors are not reported; the
    /// connection is unusable afterwards either way.
    async fn close(&mut self);
}

/// Read half of a live connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next inbound data frame.
    ///
    /// Control frames are handled by the implementation. A close frame from
    /// the peer, or the connection ending without one, is reported as
    /// [`TransportError::Closed`].
    async fn next_frame(&mut self) -> Result<Frame, TransportError>;
}

/// A freshly dialed connection, split into its halves.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

impl Connection {
    pub fn new(sink: impl FrameSink + 'static, source: impl FrameSource + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            source: Box::new(source),
        }
    }
}

/// Opens connections to a fixed endpoint URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial the endpoint. Any failure here is a [`TransportError::Dial`].
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
