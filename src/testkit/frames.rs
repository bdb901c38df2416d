//! Builders for inbound frames.

use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::TransportError;
use crate::stream::transport::Frame;

/// A `tickers.<symbol>` snapshot with the given last price.
pub fn ticker(symbol: &str, last_price: &str) -> Frame {
    Frame::Text(format!(
        r#"{{"topic":"tickers.{symbol}","ts":1673853746003,"type":"snapshot","cs":2588407389,"data":{{"symbol":"{symbol}","lastPrice":"{last_price}","highPrice24h":"21128","lowPrice24h":"20500","prevPrice24h":"20704.93","volume24h":"1719.413291","turnover24h":"35919238.58","price24hPcnt":"0.0115","usdIndexPrice":"21000.1"}}}}"#
    ))
}

/// The server's reply to a `ping` op.
pub fn pong() -> Frame {
    Frame::Text(
        r#"{"success":true,"ret_msg":"pong","conn_id":"0970e817-426e-429a-a679-ff7f55e0b16a","op":"ping"}"#
            .into(),
    )
}

/// The server's reply to a `subscribe` op.
pub fn subscribed() -> Frame {
    Frame::Text(
        r#"{"success":true,"ret_msg":"","conn_id":"0970e817-426e-429a-a679-ff7f55e0b16a","op":"subscribe"}"#
            .into(),
    )
}

/// A frame that is not JSON at all.
pub fn garbage() -> Frame {
    Frame::Text("\u{1}not json".into())
}

/// The peer closing with `code`.
pub fn closed(code: CloseCode) -> TransportError {
    TransportError::Closed {
        code,
        reason: String::new(),
    }
}

/// The connection dropping without a close frame.
pub fn dropped() -> TransportError {
    TransportError::abnormal("connection reset")
}
