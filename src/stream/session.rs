//! Streaming session lifecycle.
//!
//! [`SessionManager::run`] drives one logical session through an explicit
//! state machine:
//!
//! ```text
//! Connecting ──connect ok──────────────▶ Running
//! Connecting ──connect fails───────────▶ Closed (dial error)
//! Running ────retriable, below ceiling─▶ ReconnectPending ──backoff──▶ Connecting
//! Running ────fatal or ceiling reached─▶ Closed (error)
//! Running ────shutdown requested───────▶ ShuttingDown ──close handshake──▶ Closed (ok)
//! ```
//!
//! State changes go through [`SessionState::next`], a pure function of the
//! current state, the event that happened, and the retry counter. The
//! async loop around it only performs I/O and turns outcomes into events.
//!
//! # Tasks
//!
//! The loop runs on the caller's task and is the only writer on the
//! connection (heartbeat, subscriptions, close frame). Each connection gets
//! exactly one spawned read task that dispatches frames in arrival order.
//! Before a connection is discarded the read task is stopped and joined, so
//! two connections never coexist.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::error::Elapsed;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};
use url::Url;

use super::classifier::{Classification, CloseCodeClassifier, FailureClassifier};
use super::dispatch::{Dispatcher, HandlerRegistry};
use super::heartbeat::{Heartbeat, DEFAULT_PING_INTERVAL};
use super::messages::{PingRequest, DEFAULT_PING_REQ_ID};
use super::reader::{Reader, ReaderEvent, ReaderReport};
use super::retry::{ReconnectPolicy, RetryDecision, RetryState};
use super::subscription::SubscriptionRegistry;
use super::transport::{Connection, Frame, FrameSink, Transport};
use super::websocket::WebSocketTransport;
use crate::config::Config;
use crate::error::{Fault, Result, SessionError, TransportError};

/// Default wait for the peer to answer our close frame.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ping_interval: Duration,
    pub ping_req_id: String,
    pub shutdown_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_req_id: DEFAULT_PING_REQ_ID.into(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Counters for the most recent [`SessionManager::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Connections successfully dialed.
    pub connections: u64,
    /// Backoff periods completed before a redial.
    pub reconnects: u64,
    /// Ping frames written, including the one sent on connect.
    pub heartbeats: u64,
    /// Inbound frames pulled off the wire and dispatched.
    pub frames: u64,
    pub delivered: u64,
    pub handler_failures: u64,
    pub unroutable: u64,
}

impl SessionStats {
    fn absorb(&mut self, report: ReaderReport) {
        self.frames += report.frames;
        self.delivered += report.delivered;
        self.handler_failures += report.handler_failures;
        self.unroutable += report.unroutable;
    }
}

/// Lifecycle state of a session.
#[derive(Debug)]
pub enum SessionState {
    Connecting,
    Running,
    ReconnectPending { attempt: u32, delay: Duration },
    ShuttingDown,
    /// Terminal. `None` means a requested shutdown completed.
    Closed(Option<SessionError>),
}

/// Something that happened while in a given state.
#[derive(Debug)]
pub enum SessionEvent {
    Connected,
    DialFailed { url: String, source: TransportError },
    /// The current connection delivered its first frame.
    Healthy,
    Failed {
        fault: Fault,
        classification: Classification,
    },
    Cancelled,
    BackoffElapsed,
    ShutdownComplete,
}

impl SessionState {
    /// Compute the next state. Events that do not apply to the current
    /// state leave it unchanged.
    #[must_use]
    pub fn next(
        self,
        event: SessionEvent,
        retry: RetryState,
        policy: &ReconnectPolicy,
    ) -> (Self, RetryState) {
        match (self, event) {
            (Self::Connecting, SessionEvent::Connected) => (Self::Running, retry),
            (Self::Connecting, SessionEvent::DialFailed { url, source }) => {
                (Self::Closed(Some(SessionError::Dial { url, source })), retry)
            }
            (
                Self::Connecting | Self::Running,
                SessionEvent::Failed {
                    fault,
                    classification,
                },
            ) => match classification {
                Classification::Fatal => {
                    (Self::Closed(Some(SessionError::NonRetriable(fault))), retry)
                }
                Classification::Retriable(hint) => {
                    let (retry, decision) = retry.record_failure(hint, policy);
                    match decision {
                        RetryDecision::Reconnect { attempt, delay } => {
                            (Self::ReconnectPending { attempt, delay }, retry)
                        }
                        RetryDecision::GiveUp { attempts } => (
                            Self::Closed(Some(SessionError::RetryCeilingExceeded {
                                attempts,
                                last: fault,
                            })),
                            retry,
                        ),
                    }
                }
            },
            (Self::Running, SessionEvent::Healthy) => (Self::Running, retry.record_success(policy)),
            (Self::Running, SessionEvent::Cancelled) => (Self::ShuttingDown, retry),
            (Self::Connecting | Self::ReconnectPending { .. }, SessionEvent::Cancelled) => {
                (Self::Closed(None), retry)
            }
            (Self::ReconnectPending { .. }, SessionEvent::BackoffElapsed) => {
                (Self::Connecting, retry)
            }
            (Self::ShuttingDown, SessionEvent::ShutdownComplete) => (Self::Closed(None), retry),
            (state, _) => (state, retry),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::ReconnectPending { .. } => "reconnect_pending",
            Self::ShuttingDown => "shutting_down",
            Self::Closed(_) => "closed",
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Why the supervising wait point woke up.
enum Wake {
    Healthy,
    Cancelled,
    Fault(Fault),
}

/// The live connection and everything attached to it while Running.
struct Link {
    id: u64,
    sink: Box<dyn FrameSink>,
    reader: JoinHandle<ReaderReport>,
    events: mpsc::UnboundedReceiver<ReaderEvent>,
    stop: watch::Sender<bool>,
    heartbeat: Heartbeat,
}

impl Link {
    /// The single multi-source wait point of a running session.
    async fn supervise(&mut self, shutdown: &mut watch::Receiver<bool>) -> Wake {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    return match event {
                        Some(ReaderEvent::FirstFrame) => Wake::Healthy,
                        Some(ReaderEvent::Fault(fault)) => Wake::Fault(fault),
                        None => Wake::Fault(Fault::Transport(TransportError::abnormal(
                            "read task ended unexpectedly",
                        ))),
                    };
                }
                frame = self.heartbeat.tick() => {
                    // A write that cannot flush must not hold off shutdown.
                    tokio::select! {
                        sent = self.sink.send(frame) => {
                            if let Err(e) = sent {
                                return Wake::Fault(Fault::Transport(e));
                            }
                        }
                        () = cancelled(shutdown) => return Wake::Cancelled,
                    }
                    trace!(connection = self.id, "Heartbeat sent");
                }
                () = cancelled(shutdown) => return Wake::Cancelled,
            }
        }
    }
}

/// Resolves once shutdown is requested or the shutdown sender is dropped.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Owns the connect → run → reconnect/shutdown cycle for one endpoint.
pub struct SessionManager<T: Transport> {
    transport: T,
    url: Url,
    settings: SessionSettings,
    classifier: Arc<dyn FailureClassifier>,
    ping: Frame,
    span: Span,
    stats: SessionStats,
}

impl SessionManager<WebSocketTransport> {
    /// Build a websocket session from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            WebSocketTransport::new(),
            config.endpoint().url()?,
            config.session_settings(),
        )
    }
}

impl<T: Transport> SessionManager<T> {
    /// Create a session over `transport` targeting `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the heartbeat frame cannot be serialized.
    pub fn new(transport: T, url: Url, settings: SessionSettings) -> Result<Self> {
        let ping = PingRequest::new(settings.ping_req_id.as_str()).to_frame()?;
        let span = info_span!("session", url = %url, transport = transport.name());
        Ok(Self {
            transport,
            url,
            settings,
            classifier: Arc::new(CloseCodeClassifier),
            ping,
            span,
            stats: SessionStats::default(),
        })
    }

    /// Replace the default close-code classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl FailureClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Replace the span every component of this session logs under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Counters from the last (or current) run.
    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Run the session until it closes.
    ///
    /// Returns `Ok(())` only after a shutdown requested through `shutdown`
    /// (sending `true`, or dropping the sender) has completed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Dial`] if any dial fails,
    /// [`SessionError::NonRetriable`] for fatal connection faults, and
    /// [`SessionError::RetryCeilingExceeded`] once the reconnect budget is
    /// spent.
    pub async fn run(
        &mut self,
        shutdown: watch::Receiver<bool>,
        subscriptions: &SubscriptionRegistry,
        handlers: HandlerRegistry,
    ) -> Result<()> {
        let span = self.span.clone();
        self.drive(shutdown, subscriptions, handlers)
            .instrument(span)
            .await
    }

    async fn drive(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        subscriptions: &SubscriptionRegistry,
        handlers: HandlerRegistry,
    ) -> Result<()> {
        self.stats = SessionStats::default();
        let dispatcher = Arc::new(Dispatcher::new(
            handlers,
            info_span!(parent: &self.span, "dispatch"),
        ));
        let policy = self.settings.reconnect;

        let mut state = SessionState::Connecting;
        let mut retry = RetryState::default();
        let mut link: Option<Link> = None;

        info!(
            subscriptions = subscriptions.len(),
            handlers = dispatcher.handlers().len(),
            "Starting stream session"
        );

        let outcome = loop {
            let event = match state {
                SessionState::Closed(outcome) => break outcome,
                SessionState::Connecting => {
                    self.connect(&mut shutdown, subscriptions, &dispatcher, &mut link)
                        .await
                }
                SessionState::Running => {
                    let wake = match link.as_mut() {
                        Some(active) => active.supervise(&mut shutdown).await,
                        None => Wake::Fault(Fault::Transport(TransportError::Other(
                            "running without a connection".into(),
                        ))),
                    };
                    match wake {
                        Wake::Healthy => SessionEvent::Healthy,
                        Wake::Cancelled => SessionEvent::Cancelled,
                        Wake::Fault(fault) => {
                            if let Some(active) = link.take() {
                                self.teardown(active).await;
                            }
                            self.failed(fault)
                        }
                    }
                }
                SessionState::ReconnectPending { attempt, delay } => {
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting after delay"
                    );
                    tokio::select! {
                        () = cancelled(&mut shutdown) => SessionEvent::Cancelled,
                        () = sleep(delay) => {
                            self.stats.reconnects += 1;
                            SessionEvent::BackoffElapsed
                        }
                    }
                }
                SessionState::ShuttingDown => {
                    if let Some(active) = link.take() {
                        self.close_gracefully(active).await;
                    }
                    SessionEvent::ShutdownComplete
                }
            };

            let from = state.name();
            let (next, next_retry) = state.next(event, retry, &policy);
            debug!(
                from,
                to = next.name(),
                attempts = next_retry.attempts(),
                "Session state transition"
            );
            state = next;
            retry = next_retry;
        };

        match outcome {
            None => {
                info!(
                    connections = self.stats.connections,
                    frames = self.stats.frames,
                    "Stream session closed"
                );
                Ok(())
            }
            Some(err) => {
                error!(error = %err, "Stream session failed");
                Err(err.into())
            }
        }
    }

    /// Dial, then send the heartbeat and replay subscriptions before the
    /// read task starts.
    async fn connect(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
        subscriptions: &SubscriptionRegistry,
        dispatcher: &Arc<Dispatcher>,
        link: &mut Option<Link>,
    ) -> SessionEvent {
        let dialed = tokio::select! {
            () = cancelled(shutdown) => None,
            result = self.transport.connect(self.url.as_str()) => Some(result),
        };

        let connection = match dialed {
            None => return SessionEvent::Cancelled,
            Some(Err(source)) => {
                return SessionEvent::DialFailed {
                    url: self.url.to_string(),
                    source,
                }
            }
            Some(Ok(connection)) => connection,
        };

        self.stats.connections += 1;
        let id = self.stats.connections;

        // Dropping the half-established connection on cancellation closes it.
        let established = tokio::select! {
            result = self.establish(id, connection, subscriptions, dispatcher) => result,
            () = cancelled(shutdown) => return SessionEvent::Cancelled,
        };

        match established {
            Ok(active) => {
                info!(
                    connection = id,
                    subscriptions = subscriptions.len(),
                    "Stream running"
                );
                *link = Some(active);
                SessionEvent::Connected
            }
            Err(fault) => self.failed(fault),
        }
    }

    async fn establish(
        &mut self,
        id: u64,
        connection: Connection,
        subscriptions: &SubscriptionRegistry,
        dispatcher: &Arc<Dispatcher>,
    ) -> std::result::Result<Link, Fault> {
        let Connection { mut sink, source } = connection;

        // Ping first so the server sees activity before the subscribe burst.
        if let Err(e) = sink.send(self.ping.clone()).await {
            sink.close().await;
            return Err(e.into());
        }
        self.stats.heartbeats += 1;

        if let Err(fault) = subscriptions.replay(sink.as_mut()).await {
            sink.close().await;
            return Err(fault);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reader = Reader::new(
            source,
            Arc::clone(dispatcher),
            id,
            stop_rx,
            events_tx,
            info_span!(parent: &self.span, "reader", connection = id),
        )
        .spawn();
        let heartbeat = Heartbeat::start(
            self.settings.ping_interval,
            self.ping.clone(),
            info_span!(parent: &self.span, "heartbeat", connection = id),
        );

        Ok(Link {
            id,
            sink,
            reader,
            events: events_rx,
            stop: stop_tx,
            heartbeat,
        })
    }

    fn failed(&self, fault: Fault) -> SessionEvent {
        let classification = self.classifier.classify(&fault);
        warn!(
            error = %fault,
            retriable = classification.is_retriable(),
            "Connection failed"
        );
        SessionEvent::Failed {
            fault,
            classification,
        }
    }

    /// Tear down a failed connection: stop the read task, close the
    /// connection so a blocked read returns, then join the task. Bounded by
    /// the shutdown timeout.
    async fn teardown(&mut self, link: Link) {
        let Link {
            id,
            mut sink,
            mut reader,
            stop,
            heartbeat,
            ..
        } = link;

        let _ = stop.send(true);
        let deadline = Instant::now() + self.settings.shutdown_timeout;
        let finished = timeout_at(deadline, async {
            sink.close().await;
            (&mut reader).await
        })
        .await;
        self.finish_reader(id, reader, finished).await;
        self.stats.heartbeats += heartbeat.beats();
        debug!(connection = id, "Connection torn down");
    }

    /// Graceful close: stop dispatching, send a normal close frame and wait
    /// for the peer's answer, then close regardless. The whole sequence is
    /// bounded by the shutdown timeout.
    async fn close_gracefully(&mut self, link: Link) {
        let Link {
            id,
            mut sink,
            mut reader,
            stop,
            heartbeat,
            ..
        } = link;
        info!(connection = id, "Closing connection");

        let _ = stop.send(true);
        let deadline = Instant::now() + self.settings.shutdown_timeout;
        let finished = timeout_at(deadline, async {
            if let Err(e) = sink.send_close(CloseCode::Normal, "").await {
                warn!(connection = id, error = %e, "Failed to send close frame");
            }
            (&mut reader).await
        })
        .await;
        self.finish_reader(id, reader, finished).await;

        if timeout_at(deadline, sink.close()).await.is_err() {
            debug!(connection = id, "Close did not complete, dropping connection");
        }
        self.stats.heartbeats += heartbeat.beats();
    }

    /// Absorb the read task's report, or abort it if the deadline passed
    /// first.
    async fn finish_reader(
        &mut self,
        id: u64,
        reader: JoinHandle<ReaderReport>,
        finished: std::result::Result<std::result::Result<ReaderReport, JoinError>, Elapsed>,
    ) {
        match finished {
            Ok(Ok(report)) => self.stats.absorb(report),
            Ok(Err(e)) => warn!(connection = id, error = %e, "Read task failed"),
            Err(_) => {
                debug!(connection = id, "Read task still blocked, aborting");
                reader.abort();
                let _ = reader.await;
            }
        }
    }
}
