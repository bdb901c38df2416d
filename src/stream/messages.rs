//! Wire messages for the Bybit v5 websocket API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transport::Frame;
use crate::error::Fault;

/// Operation name for topic subscription requests.
pub const OP_SUBSCRIBE: &str = "subscribe";

/// Operation name for application-level heartbeats.
pub const OP_PING: &str = "ping";

/// Request id attached to heartbeat frames unless configured otherwise.
pub const DEFAULT_PING_REQ_ID: &str = "100001";

/// A topic subscription request, replayed verbatim on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub op: String,
    pub args: Vec<String>,
}

impl Subscription {
    /// A `subscribe` request for the given topics.
    pub fn subscribe<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op: OP_SUBSCRIBE.into(),
            args: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Serialize into a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_frame(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Frame::Text)
    }
}

/// Application-level heartbeat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingRequest {
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub op: String,
}

impl PingRequest {
    pub fn new(req_id: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
            op: OP_PING.into(),
        }
    }

    /// Serialize into a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_frame(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Frame::Text)
    }
}

/// Server reply to an operation (`ping`, `subscribe`, ...).
///
/// These frames carry no `topic` and are never routed to handlers.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_msg: Option<String>,
    #[serde(default)]
    pub conn_id: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
}

/// A decoded inbound frame: a JSON object with an optional `topic` key.
#[derive(Debug, Clone)]
pub struct Envelope {
    topic: Option<String>,
    body: Value,
}

impl Envelope {
    /// Decode a raw frame.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Decode`] if the payload is not a JSON object.
    pub fn decode(frame: &Frame) -> Result<Self, Fault> {
        let object: serde_json::Map<String, Value> =
            serde_json::from_slice(frame.as_bytes()).map_err(Fault::Decode)?;
        let topic = object
            .get("topic")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        Ok(Self {
            topic,
            body: Value::Object(object),
        })
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// The full JSON object, including the `topic` key.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Deserialize the body into a topic-specific schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn parse<'a, T: Deserialize<'a>>(&'a self) -> serde_json::Result<T> {
        T::deserialize(&self.body)
    }

    /// Interpret a topic-less frame as an operation reply.
    #[must_use]
    pub fn as_ack(&self) -> Option<OperationAck> {
        if self.topic.is_some() {
            return None;
        }
        self.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_serializes_to_wire_format() {
        let frame = Subscription::subscribe(["tickers.BTCUSDT"]).to_frame().unwrap();
        assert_eq!(
            frame,
            Frame::Text(r#"{"op":"subscribe","args":["tickers.BTCUSDT"]}"#.into())
        );
    }

    #[test]
    fn ping_request_uses_camel_case_req_id() {
        let json = serde_json::to_string(&PingRequest::new("100001")).unwrap();
        assert_eq!(json, r#"{"reqId":"100001","op":"ping"}"#);
    }

    #[test]
    fn envelope_extracts_topic() {
        let frame = Frame::Text(r#"{"topic":"tickers.ETHUSDT","ts":1,"data":{}}"#.into());
        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.topic(), Some("tickers.ETHUSDT"));
        assert_eq!(envelope.body()["ts"], 1);
    }

    #[test]
    fn pong_reply_has_no_topic_and_parses_as_ack() {
        let frame = Frame::Text(
            r#"{"success":true,"ret_msg":"pong","conn_id":"abc","op":"ping"}"#.into(),
        );
        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.topic(), None);
        let ack = envelope.as_ack().unwrap();
        assert_eq!(ack.ret_msg.as_deref(), Some("pong"));
        assert_eq!(ack.success, Some(true));
    }

    #[test]
    fn binary_frames_decode_like_text() {
        let frame = Frame::Binary(br#"{"topic":"orderbook.1.BTCUSDT"}"#.to_vec());
        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.topic(), Some("orderbook.1.BTCUSDT"));
    }

    #[test]
    fn non_object_payloads_fail_to_decode() {
        assert!(matches!(
            Envelope::decode(&Frame::Text("[1,2,3]".into())),
            Err(Fault::Decode(_))
        ));
        assert!(matches!(
            Envelope::decode(&Frame::Text("not json".into())),
            Err(Fault::Decode(_))
        ));
    }
}
