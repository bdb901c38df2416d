//! Websocket transport backed by `tokio-tungstenite`.
//!
//! The stream is split after the handshake: the write half becomes a
//! [`WsSink`], the read half a [`WsSource`]. Protocol-level pings from the
//! server are answered by tungstenite itself; `WsSource` only surfaces data
//! frames and translates closures into [`TransportError::Closed`].

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use super::transport::{Connection, Frame, FrameSink, FrameSource, Transport};
use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production [`Transport`] dialing real websocket endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        info!(url = %url, "Connecting to WebSocket");

        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Dial(e.to_string()))?;

        info!(status = %response.status(), "WebSocket connected");

        let (write, read) = ws_stream.split();
        Ok(Connection::new(WsSink { inner: write }, WsSource { inner: read }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Write half of a websocket connection.
pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.inner.send(message).await.map_err(classify_ws_error)
    }

    async fn send_close(&mut self, code: CloseCode, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        self.inner
            .send(Message::Close(Some(frame)))
            .await
            .map_err(classify_ws_error)
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close().await {
            debug!(error = %e, "WebSocket close returned an error");
        }
    }
}

/// Read half of a websocket connection.
pub struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let Some(message) = self.inner.next().await else {
                return Err(TransportError::abnormal("stream ended without close frame"));
            };

            match message {
                Ok(Message::Text(text)) => return Ok(Frame::Text(text)),
                Ok(Message::Binary(bytes)) => return Ok(Frame::Binary(bytes)),
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    return Err(match frame {
                        Some(frame) => TransportError::Closed {
                            code: frame.code,
                            reason: frame.reason.into_owned(),
                        },
                        None => TransportError::Closed {
                            code: CloseCode::Status,
                            reason: String::new(),
                        },
                    });
                }
                // Pongs are queued by tungstenite and flushed with the next write.
                Ok(Message::Ping(_)) => trace!("Received WebSocket ping"),
                Ok(_) => continue,
                Err(e) => return Err(classify_ws_error(e)),
            }
        }
    }
}

/// Map a tungstenite failure onto the transport error taxonomy.
///
/// A connection that vanishes without a close handshake is reported as an
/// abnormal closure (1006), which is never sent on the wire.
fn classify_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
        | WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Io(_) => TransportError::abnormal(err.to_string()),
        other => TransportError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn reset_without_handshake_is_abnormal() {
        let err = classify_ws_error(WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake,
        ));
        assert_eq!(err.close_code(), Some(CloseCode::Abnormal));
    }

    #[test]
    fn io_failures_are_abnormal() {
        let err = classify_ws_error(WsError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset by peer",
        )));
        assert_eq!(err.close_code(), Some(CloseCode::Abnormal));
    }

    #[test]
    fn other_protocol_errors_are_not_closures() {
        let err = classify_ws_error(WsError::Utf8);
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[tokio::test]
    async fn dialing_unreachable_host_is_dial_failure() {
        let transport = WebSocketTransport::new();
        let result = transport.connect("ws://127.0.0.1:1/v5/public/spot").await;
        assert!(matches!(result, Err(TransportError::Dial(_))));
    }
}
