//! Runs a session on a spawned task against a scripted transport.

use bybit_stream::error::Result;
use bybit_stream::stream::transport::Frame;
use bybit_stream::stream::{
    FailureClassifier, HandlerRegistry, PingRequest, SessionManager, SessionSettings,
    SessionStats, Subscription, SubscriptionRegistry,
};
use bybit_stream::testkit::transport::{ScriptedTransport, TransportProbe};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

pub const URL: &str = "wss://stream.test/v5/public/spot";

pub struct RunningSession {
    pub probe: TransportProbe,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<(Result<()>, SessionStats)>,
}

impl RunningSession {
    pub fn start(
        transport: ScriptedTransport,
        settings: SessionSettings,
        subscriptions: SubscriptionRegistry,
        handlers: HandlerRegistry,
    ) -> Self {
        let probe = transport.probe();
        let session = SessionManager::new(transport, Url::parse(URL).unwrap(), settings)
            .expect("session builds");
        Self::launch(session, probe, subscriptions, handlers)
    }

    /// Like [`RunningSession::start`], with a custom failure classifier.
    pub fn start_with_classifier(
        transport: ScriptedTransport,
        settings: SessionSettings,
        classifier: impl FailureClassifier + 'static,
        subscriptions: SubscriptionRegistry,
        handlers: HandlerRegistry,
    ) -> Self {
        let probe = transport.probe();
        let session = SessionManager::new(transport, Url::parse(URL).unwrap(), settings)
            .expect("session builds")
            .with_classifier(classifier);
        Self::launch(session, probe, subscriptions, handlers)
    }

    fn launch(
        mut session: SessionManager<ScriptedTransport>,
        probe: TransportProbe,
        subscriptions: SubscriptionRegistry,
        handlers: HandlerRegistry,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let result = session.run(shutdown_rx, &subscriptions, handlers).await;
            (result, session.stats())
        });

        Self {
            probe,
            shutdown,
            task,
        }
    }

    /// Request a graceful shutdown and wait for `run` to return.
    pub async fn stop(self) -> (Result<()>, SessionStats) {
        self.shutdown.send(true).unwrap();
        self.task.await.unwrap()
    }

    /// Wait for `run` to return on its own.
    pub async fn join(self) -> (Result<()>, SessionStats) {
        let Self { task, shutdown, .. } = self;
        let outcome = task.await.unwrap();
        drop(shutdown);
        outcome
    }

    /// Drop the shutdown sender without sending, then wait for `run`.
    pub async fn abandon(self) -> (Result<()>, SessionStats) {
        let Self { task, shutdown, .. } = self;
        drop(shutdown);
        task.await.unwrap()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.send(true).unwrap();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn ping() -> Frame {
    PingRequest::new("100001").to_frame().unwrap()
}

pub fn subscriptions(topics: &[&str]) -> SubscriptionRegistry {
    SubscriptionRegistry::from_subscriptions(
        topics.iter().map(|t| Subscription::subscribe([*t])),
    )
    .unwrap()
}

/// `[ping, subscribe...]`: what every connection should open with.
pub fn handshake(subscriptions: &SubscriptionRegistry) -> Vec<Frame> {
    std::iter::once(ping())
        .chain(subscriptions.iter().map(|s| s.to_frame().unwrap()))
        .collect()
}
