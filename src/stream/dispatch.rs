//! Topic routing for inbound frames.
//!
//! Every inbound frame is decoded into an [`Envelope`] and handed to the
//! [`MessageHandler`] registered for its topic. Frames are dispatched one
//! at a time, in arrival order, by the read task that owns the connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn, Span};

use super::messages::Envelope;
use super::transport::Frame;
use crate::error::Fault;

/// Per-frame context passed to handlers.
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// Topic the frame was routed on.
    pub topic: String,
    /// Sequence number of the connection (1 for the first dial).
    pub connection: u64,
    /// When the read task pulled the frame off the connection.
    pub received_at: DateTime<Utc>,
}

/// A consumer for one topic.
///
/// Implementations must not block indefinitely: the read task waits for
/// `process_message` to finish before pulling the next frame. Errors are
/// logged by the dispatcher and never end the stream.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn process_message(&self, ctx: &MessageContext, envelope: &Envelope)
        -> anyhow::Result<()>;
}

/// Topic → handler mapping. Built before the session starts and read-only
/// while it runs.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, returning any handler it replaces.
    pub fn register(
        &mut self,
        topic: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.insert(topic.into(), handler)
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, topic: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.register(topic, handler);
        self
    }

    #[must_use]
    pub fn get(&self, topic: &str) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers.get(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut topics: Vec<_> = self.topics().collect();
        topics.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("topics", &topics)
            .finish()
    }
}

/// What happened to one dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The topic handler processed the frame.
    Delivered,
    /// The topic handler returned an error (logged).
    HandlerFailed,
    /// The frame had a topic nobody registered for.
    Unroutable,
    /// The frame had no topic (operation reply).
    Control,
}

/// Decodes frames and routes them to topic handlers.
pub struct Dispatcher {
    handlers: HandlerRegistry,
    span: Span,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(handlers: HandlerRegistry, span: Span) -> Self {
        Self { handlers, span }
    }

    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Decode and route one frame.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Decode`] if the frame is not a JSON object. Handler
    /// failures and unknown topics are not errors.
    pub async fn dispatch(&self, frame: &Frame, connection: u64) -> Result<DispatchOutcome, Fault> {
        let received_at = Utc::now();
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.span
                    .in_scope(|| warn!(error = %e, bytes = frame.len(), "Failed to decode frame"));
                return Err(e);
            }
        };

        let Some(topic) = envelope.topic() else {
            self.span.in_scope(|| match envelope.as_ack() {
                Some(ack) => debug!(
                    op = ack.op.as_deref().unwrap_or_default(),
                    success = ?ack.success,
                    ret_msg = ack.ret_msg.as_deref().unwrap_or_default(),
                    "Operation acknowledged"
                ),
                None => debug!(bytes = frame.len(), "Discarding frame without topic"),
            });
            return Ok(DispatchOutcome::Control);
        };

        let Some(handler) = self.handlers.get(topic) else {
            self.span
                .in_scope(|| debug!(topic, bytes = frame.len(), "No handler for topic"));
            return Ok(DispatchOutcome::Unroutable);
        };

        let ctx = MessageContext {
            topic: topic.to_owned(),
            connection,
            received_at,
        };

        match handler.process_message(&ctx, &envelope).await {
            Ok(()) => {
                self.span.in_scope(|| trace!(topic, "Frame delivered"));
                Ok(DispatchOutcome::Delivered)
            }
            Err(e) => {
                self.span
                    .in_scope(|| warn!(topic, error = %e, "Handler failed to process message"));
                Ok(DispatchOutcome::HandlerFailed)
            }
        }
    }
}
