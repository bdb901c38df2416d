//! The per-connection read task.
//!
//! Owns the [`FrameSource`] half of one connection and pulls frames until
//! the connection fails or the supervisor asks it to stop. It reports to
//! the supervisor through an event channel and returns its counters when
//! it finishes. It never writes to the connection.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, Instrument, Span};

use super::dispatch::{DispatchOutcome, Dispatcher};
use super::transport::FrameSource;
use crate::error::Fault;

/// Signals from the read task to the supervising loop.
#[derive(Debug)]
pub(crate) enum ReaderEvent {
    /// The first frame arrived on this connection.
    FirstFrame,
    /// The connection can no longer be read from.
    Fault(Fault),
}

/// Counters accumulated by one read task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReaderReport {
    pub frames: u64,
    pub delivered: u64,
    pub handler_failures: u64,
    pub unroutable: u64,
}

impl ReaderReport {
    fn record(&mut self, outcome: DispatchOutcome) {
        self.frames += 1;
        match outcome {
            DispatchOutcome::Delivered => self.delivered += 1,
            DispatchOutcome::HandlerFailed => self.handler_failures += 1,
            DispatchOutcome::Unroutable => self.unroutable += 1,
            DispatchOutcome::Control => {}
        }
    }
}

pub(crate) struct Reader {
    source: Box<dyn FrameSource>,
    dispatcher: Arc<Dispatcher>,
    connection: u64,
    stop: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<ReaderEvent>,
    span: Span,
}

impl Reader {
    pub(crate) fn new(
        source: Box<dyn FrameSource>,
        dispatcher: Arc<Dispatcher>,
        connection: u64,
        stop: watch::Receiver<bool>,
        events: mpsc::UnboundedSender<ReaderEvent>,
        span: Span,
    ) -> Self {
        Self {
            source,
            dispatcher,
            connection,
            stop,
            events,
            span,
        }
    }

    pub(crate) fn spawn(self) -> tokio::task::JoinHandle<ReaderReport> {
        let span = self.span.clone();
        tokio::spawn(self.run().instrument(span))
    }

    async fn run(mut self) -> ReaderReport {
        let mut report = ReaderReport::default();
        let mut first = true;

        loop {
            let result = self.source.next_frame().await;

            // Once stopping, keep draining until the peer finishes the close
            // handshake or the connection goes away, but dispatch nothing.
            if *self.stop.borrow() {
                match result {
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(connection = self.connection, reason = %e, "Read task drained");
                        break;
                    }
                }
            }

            let frame = match result {
                Ok(frame) => frame,
                Err(e) => {
                    let _ = self.events.send(ReaderEvent::Fault(Fault::Transport(e)));
                    break;
                }
            };

            if first {
                first = false;
                let _ = self.events.send(ReaderEvent::FirstFrame);
            }

            match self.dispatcher.dispatch(&frame, self.connection).await {
                Ok(outcome) => report.record(outcome),
                Err(fault) => {
                    report.frames += 1;
                    let _ = self.events.send(ReaderEvent::Fault(fault));
                    break;
                }
            }
        }

        debug!(
            connection = self.connection,
            frames = report.frames,
            "Read task finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::stream::dispatch::HandlerRegistry;
    use crate::testkit::frames;
    use crate::testkit::handler::{FailingHandler, RecordingHandler};
    use crate::testkit::transport::ScriptedSource;

    fn reader(
        source: ScriptedSource,
        handlers: HandlerRegistry,
    ) -> (
        Reader,
        watch::Sender<bool>,
        mpsc::UnboundedReceiver<ReaderEvent>,
    ) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(Dispatcher::new(handlers, Span::none()));
        let reader = Reader::new(
            Box::new(source),
            dispatcher,
            1,
            stop_rx,
            events_tx,
            Span::none(),
        );
        (reader, stop_tx, events_rx)
    }

    #[tokio::test]
    async fn handler_failure_does_not_stop_reading() {
        let failing = Arc::new(FailingHandler::new());
        let recorder = Arc::new(RecordingHandler::new());
        let handlers = HandlerRegistry::new()
            .with("tickers.BTCUSDT", failing.clone())
            .with("tickers.ETHUSDT", recorder.clone());

        let source = ScriptedSource::new(vec![
            Ok(frames::ticker("BTCUSDT", "1")),
            Ok(frames::ticker("ETHUSDT", "2")),
            Err(TransportError::abnormal("gone")),
        ]);
        let (reader, _stop, mut events) = reader(source, handlers);

        let report = reader.spawn().await.unwrap();

        assert_eq!(failing.count(), 1);
        assert_eq!(recorder.count(), 1);
        assert_eq!(report.handler_failures, 1);
        assert_eq!(report.delivered, 1);
        assert!(matches!(events.recv().await, Some(ReaderEvent::FirstFrame)));
        assert!(matches!(
            events.recv().await,
            Some(ReaderEvent::Fault(Fault::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn dispatches_in_arrival_order() {
        let recorder = Arc::new(RecordingHandler::new());
        let handlers = HandlerRegistry::new()
            .with("tickers.BTCUSDT", recorder.clone())
            .with("tickers.ETHUSDT", recorder.clone());
        let source = ScriptedSource::new(vec![
            Ok(frames::ticker("BTCUSDT", "3")),
            Ok(frames::ticker("ETHUSDT", "1")),
            Ok(frames::pong()),
            Ok(frames::ticker("BTCUSDT", "2")),
            Err(TransportError::abnormal("gone")),
        ]);
        let (reader, _stop, _events) = reader(source, handlers);

        let report = reader.spawn().await.unwrap();

        assert_eq!(recorder.last_prices(), ["3", "1", "2"]);
        assert_eq!(
            recorder.topics(),
            ["tickers.BTCUSDT", "tickers.ETHUSDT", "tickers.BTCUSDT"]
        );
        assert_eq!(report.frames, 4);
    }

    #[tokio::test]
    async fn decode_failure_ends_the_task() {
        let recorder = Arc::new(RecordingHandler::new());
        let handlers = HandlerRegistry::new().with("tickers.BTCUSDT", recorder.clone());
        let source = ScriptedSource::new(vec![
            Ok(frames::garbage()),
            Ok(frames::ticker("BTCUSDT", "1")),
        ]);
        let (reader, _stop, mut events) = reader(source, handlers);

        reader.spawn().await.unwrap();

        assert_eq!(recorder.count(), 0);
        assert!(matches!(events.recv().await, Some(ReaderEvent::FirstFrame)));
        assert!(matches!(
            events.recv().await,
            Some(ReaderEvent::Fault(Fault::Decode(_)))
        ));
    }

    #[tokio::test]
    async fn stopping_drains_without_dispatch_or_fault() {
        let recorder = Arc::new(RecordingHandler::new());
        let handlers = HandlerRegistry::new().with("tickers.BTCUSDT", recorder.clone());
        let source = ScriptedSource::new(vec![
            Ok(frames::ticker("BTCUSDT", "1")),
            Err(TransportError::Closed {
                code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                reason: String::new(),
            }),
        ]);
        let (reader, stop, mut events) = reader(source, handlers);

        stop.send(true).unwrap();
        let report = reader.spawn().await.unwrap();

        assert_eq!(recorder.count(), 0);
        assert_eq!(report, ReaderReport::default());
        assert!(events.recv().await.is_none());
    }
}
