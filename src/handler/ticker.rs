//! `tickers.<symbol>` stream.
//!
//! Spot tickers are always snapshots; derivatives send a snapshot followed
//! by deltas carrying only the fields that changed, so every field except
//! `symbol` is optional.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn, Span};

use crate::stream::dispatch::{MessageContext, MessageHandler};
use crate::stream::messages::Envelope;

/// One ticker push.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerMessage {
    pub topic: String,
    /// `snapshot` or `delta`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Server timestamp in milliseconds.
    pub ts: i64,
    /// Cross sequence.
    #[serde(default)]
    pub cs: Option<u64>,
    pub data: TickerData,
}

/// Ticker fields. Prices and sizes arrive as strings and decode to
/// [`Decimal`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    pub symbol: String,
    #[serde(default)]
    pub last_price: Option<Decimal>,
    #[serde(default, rename = "highPrice24h")]
    pub high_price_24h: Option<Decimal>,
    #[serde(default, rename = "lowPrice24h")]
    pub low_price_24h: Option<Decimal>,
    #[serde(default, rename = "prevPrice24h")]
    pub prev_price_24h: Option<Decimal>,
    #[serde(default, rename = "volume24h")]
    pub volume_24h: Option<Decimal>,
    #[serde(default, rename = "turnover24h")]
    pub turnover_24h: Option<Decimal>,
    #[serde(default, rename = "price24hPcnt")]
    pub price_24h_pcnt: Option<Decimal>,
    #[serde(default)]
    pub usd_index_price: Option<Decimal>,
    // Derivatives only.
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub index_price: Option<Decimal>,
    #[serde(default)]
    pub bid1_price: Option<Decimal>,
    #[serde(default)]
    pub ask1_price: Option<Decimal>,
    #[serde(default)]
    pub funding_rate: Option<Decimal>,
    #[serde(default)]
    pub open_interest: Option<Decimal>,
}

impl TickerMessage {
    /// Decode a routed envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a ticker push.
    pub fn from_envelope(envelope: &Envelope) -> serde_json::Result<Self> {
        envelope.parse()
    }

    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.kind == "snapshot"
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.data.symbol
    }
}

impl TickerData {
    /// Absolute 24h change, if both prices are present.
    #[must_use]
    pub fn change_24h(&self) -> Option<Decimal> {
        Some(self.last_price? - self.prev_price_24h?)
    }

    /// `ask1 - bid1`, if both sides are present.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.ask1_price? - self.bid1_price?)
    }

    /// Midpoint of the best bid and ask.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.ask1_price? + self.bid1_price?) / Decimal::TWO)
    }
}

/// Logs every ticker and optionally forwards it to a consumer.
pub struct TickerHandler {
    forward: Option<mpsc::Sender<TickerMessage>>,
    span: Span,
}

impl TickerHandler {
    #[must_use]
    pub fn new(span: Span) -> Self {
        Self {
            forward: None,
            span,
        }
    }

    /// Forward decoded tickers on `tx`. A full channel drops the update
    /// rather than stalling the read task.
    #[must_use]
    pub fn with_forwarding(mut self, tx: mpsc::Sender<TickerMessage>) -> Self {
        self.forward = Some(tx);
        self
    }
}

#[async_trait]
impl MessageHandler for TickerHandler {
    async fn process_message(
        &self,
        ctx: &MessageContext,
        envelope: &Envelope,
    ) -> anyhow::Result<()> {
        let ticker = TickerMessage::from_envelope(envelope)
            .with_context(|| format!("invalid ticker payload on {}", ctx.topic))?;

        self.span.in_scope(|| {
            info!(
                symbol = ticker.symbol(),
                kind = %ticker.kind,
                last_price = ?ticker.data.last_price,
                connection = ctx.connection,
                "Ticker"
            );
        });

        let Some(tx) = &self.forward else {
            return Ok(());
        };
        match tx.try_send(ticker) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                self.span.in_scope(|| {
                    warn!(symbol = dropped.symbol(), "Ticker consumer lagging, update dropped");
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => anyhow::bail!("ticker consumer closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::transport::Frame;
    use crate::testkit::frames;
    use rust_decimal_macros::dec;

    fn envelope(frame: &Frame) -> Envelope {
        Envelope::decode(frame).unwrap()
    }

    fn ctx(topic: &str) -> MessageContext {
        MessageContext {
            topic: topic.into(),
            connection: 1,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_spot_snapshot() {
        let msg = TickerMessage::from_envelope(&envelope(&frames::ticker("BTCUSDT", "21109.77")))
            .unwrap();
        assert!(msg.is_snapshot());
        assert_eq!(msg.symbol(), "BTCUSDT");
        assert_eq!(msg.data.last_price, Some(dec!(21109.77)));
        assert_eq!(msg.data.change_24h(), Some(dec!(404.84)));
        assert_eq!(
            msg.timestamp().unwrap().timestamp_millis(),
            1_673_853_746_003
        );
        assert_eq!(msg.data.spread(), None);
    }

    #[test]
    fn decodes_linear_delta_with_partial_fields() {
        let frame = Frame::Text(
            r#"{"topic":"tickers.BTCUSDT","type":"delta","ts":1673272861686,"cs":24987956059,"data":{"symbol":"BTCUSDT","bid1Price":"17215.50","ask1Price":"17216.00","fundingRate":"-0.000212"}}"#
                .into(),
        );
        let msg = TickerMessage::from_envelope(&envelope(&frame)).unwrap();
        assert!(!msg.is_snapshot());
        assert_eq!(msg.data.last_price, None);
        assert_eq!(msg.data.spread(), Some(dec!(0.50)));
        assert_eq!(msg.data.mid_price(), Some(dec!(17215.75)));
        assert_eq!(msg.data.funding_rate, Some(dec!(-0.000212)));
    }

    #[tokio::test]
    async fn forwards_decoded_tickers() {
        let (tx, mut rx) = mpsc::channel(4);
        let handler = TickerHandler::new(Span::none()).with_forwarding(tx);

        handler
            .process_message(
                &ctx("tickers.ETHUSDT"),
                &envelope(&frames::ticker("ETHUSDT", "1500")),
            )
            .await
            .unwrap();

        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded.data.last_price, Some(dec!(1500)));
    }

    #[tokio::test]
    async fn full_channel_drops_without_error() {
        let (tx, _rx) = mpsc::channel(1);
        let handler = TickerHandler::new(Span::none()).with_forwarding(tx);
        let env = envelope(&frames::ticker("ETHUSDT", "1500"));

        handler.process_message(&ctx("tickers.ETHUSDT"), &env).await.unwrap();
        handler.process_message(&ctx("tickers.ETHUSDT"), &env).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_non_ticker_payload() {
        let handler = TickerHandler::new(Span::none());
        let frame = Frame::Text(r#"{"topic":"tickers.BTCUSDT","data":[]}"#.into());
        let err = handler
            .process_message(&ctx("tickers.BTCUSDT"), &envelope(&frame))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tickers.BTCUSDT"));
    }
}
