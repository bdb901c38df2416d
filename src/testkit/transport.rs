//! In-memory transport for driving a session without a network.
//!
//! - [`ScriptedTransport`] - Pops one scripted dial outcome per `connect()`.
//!   Once the script runs out, every dial yields a quiet open connection.
//! - [`ScriptedConnection`] - Inbound frames/faults queued up front, plus an
//!   optional [`ConnectionHandle`] for pushing more while the session runs.
//! - [`TransportProbe`] - Shared view of dial attempts and everything the
//!   session wrote, per connection.
//! - [`ScriptedSource`] - Standalone read half for read-task tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::TransportError;
use crate::stream::transport::{Connection, Frame, FrameSink, FrameSource, Transport};

type Inbound = Result<Frame, TransportError>;

/// Something the session wrote on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Frame),
    Close(CloseCode),
}

#[derive(Debug, Default)]
struct ProbeState {
    dials: u32,
    urls: Vec<String>,
    outbound: Vec<Vec<Outbound>>,
    closed: Vec<bool>,
}

/// Shared record of transport activity.
#[derive(Debug, Clone, Default)]
pub struct TransportProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl TransportProbe {
    /// Dial attempts, successful or not.
    pub fn dials(&self) -> u32 {
        self.state.lock().dials
    }

    /// Connections that were handed to the session.
    pub fn connections(&self) -> usize {
        self.state.lock().outbound.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    /// Everything written on connection `index` (0-based), in order.
    pub fn outbound(&self, index: usize) -> Vec<Outbound> {
        self.state
            .lock()
            .outbound
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Data frames written on connection `index`.
    pub fn sent(&self, index: usize) -> Vec<Frame> {
        self.outbound(index)
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Frame(frame) => Some(frame),
                Outbound::Close(_) => None,
            })
            .collect()
    }

    /// Close codes sent across all connections.
    pub fn close_codes(&self) -> Vec<CloseCode> {
        self.state
            .lock()
            .outbound
            .iter()
            .flatten()
            .filter_map(|o| match o {
                Outbound::Close(code) => Some(*code),
                Outbound::Frame(_) => None,
            })
            .collect()
    }

    /// Whether the session called `close()` on connection `index`.
    pub fn is_closed(&self, index: usize) -> bool {
        self.state.lock().closed.get(index).copied().unwrap_or(false)
    }

    fn record_dial(&self, url: &str) {
        let mut state = self.state.lock();
        state.dials += 1;
        state.urls.push(url.to_owned());
    }

    fn open(&self) -> usize {
        let mut state = self.state.lock();
        state.outbound.push(Vec::new());
        state.closed.push(false);
        state.outbound.len() - 1
    }

    fn record(&self, index: usize, outbound: Outbound) {
        if let Some(log) = self.state.lock().outbound.get_mut(index) {
            log.push(outbound);
        }
    }

    fn mark_closed(&self, index: usize) {
        if let Some(closed) = self.state.lock().closed.get_mut(index) {
            *closed = true;
        }
    }
}

/// Pushes inbound items into a live scripted connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl ConnectionHandle {
    pub fn push(&self, frame: Frame) {
        let _ = self.tx.send(Ok(frame));
    }

    /// The peer closes the connection with `code`.
    pub fn close(&self, code: CloseCode) {
        let _ = self.tx.send(Err(TransportError::Closed {
            code,
            reason: String::new(),
        }));
    }
}

/// What happens to outbound frames past a limit.
#[derive(Debug, Clone)]
enum SendFailure {
    Fail(TransportError),
    Stall,
}

/// One scripted connection.
///
/// Queued items are delivered immediately, in order. Afterwards the
/// connection stays open until the session closes it or a
/// [`ConnectionHandle`] pushes more.
pub struct ScriptedConnection {
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    ack_close: bool,
    stall_close: bool,
    sends_after: Option<(usize, SendFailure)>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            ack_close: true,
            stall_close: false,
            sends_after: None,
        }
    }

    /// Queue an inbound frame.
    #[must_use]
    pub fn frame(self, frame: Frame) -> Self {
        let _ = self.tx.send(Ok(frame));
        self
    }

    /// Queue an inbound failure, typically a close.
    #[must_use]
    pub fn fail(self, error: TransportError) -> Self {
        let _ = self.tx.send(Err(error));
        self
    }

    /// Never answer our close frame.
    #[must_use]
    pub fn no_close_ack(mut self) -> Self {
        self.ack_close = false;
        self
    }

    /// Writing our close frame never completes, as if the peer stopped
    /// reading.
    #[must_use]
    pub fn stall_close(mut self) -> Self {
        self.stall_close = true;
        self
    }

    /// Accept `n` outbound frames, then fail every send with `error`.
    #[must_use]
    pub fn fail_sends_after(mut self, n: usize, error: TransportError) -> Self {
        self.sends_after = Some((n, SendFailure::Fail(error)));
        self
    }

    /// Accept `n` outbound frames, then never complete another send.
    #[must_use]
    pub fn stall_sends_after(mut self, n: usize) -> Self {
        self.sends_after = Some((n, SendFailure::Stall));
        self
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            tx: self.tx.clone(),
        }
    }
}

impl Default for ScriptedConnection {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport whose dials follow a script.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ScriptedConnection, TransportError>>>,
    probe: TransportProbe,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next dial succeeds with `connection`.
    #[must_use]
    pub fn then_connect(self, connection: ScriptedConnection) -> Self {
        self.script.lock().push_back(Ok(connection));
        self
    }

    /// The next dial fails.
    #[must_use]
    pub fn then_fail_dial(self, reason: &str) -> Self {
        self.script
            .lock()
            .push_back(Err(TransportError::Dial(reason.to_owned())));
        self
    }

    pub fn probe(&self) -> TransportProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        self.probe.record_dial(url);
        let next = self.script.lock().pop_front();
        let scripted = next.unwrap_or_else(|| Ok(ScriptedConnection::new()))?;

        let index = self.probe.open();
        let ScriptedConnection {
            tx,
            rx,
            ack_close,
            stall_close,
            sends_after,
        } = scripted;

        let (closed_tx, closed_rx) = watch::channel(false);
        Ok(Connection::new(
            ScriptedSink {
                index,
                probe: self.probe.clone(),
                tx: Some(tx),
                closed: closed_tx,
                ack_close,
                stall_close,
                sends_after,
                sent: 0,
            },
            ScriptedSource {
                rx,
                closed: Some(closed_rx),
            },
        ))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Write half of a scripted connection.
pub struct ScriptedSink {
    index: usize,
    probe: TransportProbe,
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    closed: watch::Sender<bool>,
    ack_close: bool,
    stall_close: bool,
    sends_after: Option<(usize, SendFailure)>,
    sent: usize,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.tx.is_none() {
            return Err(TransportError::Other("connection already closed".into()));
        }
        if let Some((limit, failure)) = &self.sends_after {
            if self.sent >= *limit {
                return match failure {
                    SendFailure::Fail(error) => Err(error.clone()),
                    SendFailure::Stall => std::future::pending().await,
                };
            }
        }
        self.sent += 1;
        self.probe.record(self.index, Outbound::Frame(frame));
        Ok(())
    }

    async fn send_close(&mut self, code: CloseCode, reason: &str) -> Result<(), TransportError> {
        let Some(tx) = &self.tx else {
            return Err(TransportError::Other("connection already closed".into()));
        };
        self.probe.record(self.index, Outbound::Close(code));
        if self.stall_close {
            return std::future::pending().await;
        }
        if self.ack_close {
            let _ = tx.send(Err(TransportError::Closed {
                code,
                reason: reason.to_owned(),
            }));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.tx = None;
        let _ = self.closed.send(true);
        self.probe.mark_closed(self.index);
    }
}

/// Read half backed by a channel. Queued items are drained first; once the
/// sink is closed or every sender is gone the connection reports an abnormal
/// closure.
pub struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Inbound>,
    closed: Option<watch::Receiver<bool>>,
}

impl ScriptedSource {
    /// A source that yields `items` and then ends.
    pub fn new(items: Vec<Inbound>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in items {
            let _ = tx.send(item);
        }
        Self { rx, closed: None }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        let Some(closed) = self.closed.as_mut() else {
            return match self.rx.recv().await {
                Some(item) => item,
                None => Err(TransportError::abnormal("scripted connection ended")),
            };
        };

        tokio::select! {
            biased;
            item = self.rx.recv() => match item {
                Some(item) => item,
                None => Err(TransportError::abnormal("scripted connection ended")),
            },
            () = closed_locally(closed) => {
                Err(TransportError::abnormal("connection closed locally"))
            }
        }
    }
}

async fn closed_locally(closed: &mut watch::Receiver<bool>) {
    loop {
        if *closed.borrow_and_update() {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}
