//! The streaming session and its building blocks.
//!
//! - [`session`] - Lifecycle state machine: connect, run, reconnect, shut down.
//! - [`transport`] - Connection port; [`websocket`] implements it.
//! - [`classifier`] - Decides whether a connection fault is worth retrying.
//! - [`retry`] - Attempt ceiling and linear backoff.
//! - [`dispatch`] - Topic routing to [`MessageHandler`]s.
//! - [`subscription`] - Requests replayed on every connection.
//! - [`heartbeat`] - Periodic `ping` op.

pub mod classifier;
pub mod dispatch;
pub mod endpoint;
pub mod heartbeat;
pub mod messages;
mod reader;
pub mod retry;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod websocket;

pub use classifier::{Classification, CloseCodeClassifier, FailureClassifier, WaitHint};
pub use dispatch::{DispatchOutcome, Dispatcher, HandlerRegistry, MessageContext, MessageHandler};
pub use endpoint::{ChannelType, CoverType, Endpoint};
pub use messages::{Envelope, OperationAck, PingRequest, Subscription};
pub use retry::{Backoff, ReconnectPolicy, RetryMode};
pub use session::{SessionManager, SessionSettings, SessionState, SessionStats};
pub use subscription::SubscriptionRegistry;
pub use transport::{Connection, Frame, FrameSink, FrameSource, Transport};
pub use websocket::WebSocketTransport;
