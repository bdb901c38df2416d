//! Ordered subscription list replayed on every connection.

use super::messages::Subscription;
use super::transport::{Frame, FrameSink};
use crate::error::{Fault, Result};

/// Subscriptions in registration order, pre-serialized for replay.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<(Subscription, Frame)>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription. Order of registration is order of replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be serialized.
    pub fn register(&mut self, subscription: Subscription) -> Result<&mut Self> {
        let frame = subscription.to_frame()?;
        self.entries.push((subscription, frame));
        Ok(self)
    }

    /// Build a registry from a list of subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if any subscription cannot be serialized.
    pub fn from_subscriptions<I>(subscriptions: I) -> Result<Self>
    where
        I: IntoIterator<Item = Subscription>,
    {
        let mut registry = Self::new();
        for subscription in subscriptions {
            registry.register(subscription)?;
        }
        Ok(registry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter().map(|(subscription, _)| subscription)
    }

    /// Every topic across all subscriptions, in order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.iter().flat_map(|s| s.args.iter().map(String::as_str))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Send every subscription on `sink`, stopping at the first failure.
    pub(crate) async fn replay(&self, sink: &mut dyn FrameSink) -> std::result::Result<(), Fault> {
        for (_, frame) in &self.entries {
            sink.send(frame.clone()).await?;
        }
        Ok(())
    }
}
