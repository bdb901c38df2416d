//! Message handlers for asserting dispatch behavior.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::stream::dispatch::{MessageContext, MessageHandler};
use crate::stream::messages::Envelope;

/// Records every message it receives, in delivery order.
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<(MessageContext, Envelope)>>,
    notify: Notify,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn topics(&self) -> Vec<String> {
        self.seen.lock().iter().map(|(c, _)| c.topic.clone()).collect()
    }

    /// Connection sequence number of each delivery, in order.
    pub fn connections(&self) -> Vec<u64> {
        self.seen.lock().iter().map(|(c, _)| c.connection).collect()
    }

    /// `data.lastPrice` of each delivered ticker, in order.
    pub fn last_prices(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|(_, envelope)| envelope.body()["data"]["lastPrice"].as_str())
            .map(str::to_owned)
            .collect()
    }

    /// Wait until at least `n` messages have been recorded.
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn process_message(
        &self,
        ctx: &MessageContext,
        envelope: &Envelope,
    ) -> anyhow::Result<()> {
        self.seen.lock().push((ctx.clone(), envelope.clone()));
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Fails every message and counts how often it was called.
#[derive(Default)]
pub struct FailingHandler {
    calls: AtomicU32,
}

impl FailingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn process_message(
        &self,
        ctx: &MessageContext,
        _envelope: &Envelope,
    ) -> anyhow::Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        anyhow::bail!("handler rejected message {n} on {}", ctx.topic)
    }
}

/// Never finishes processing. Used to hold the read task in a handler.
#[derive(Default)]
pub struct StallingHandler {
    calls: AtomicU32,
}

impl StallingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for StallingHandler {
    async fn process_message(
        &self,
        _ctx: &MessageContext,
        _envelope: &Envelope,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
