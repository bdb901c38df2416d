//! Public topic names.
//!
//! Bybit topics are dot-separated: `<stream>.<params...>.<symbol>`.

pub const TICKERS: &str = "tickers";
pub const ORDERBOOK: &str = "orderbook";
pub const PUBLIC_TRADE: &str = "publicTrade";
pub const KLINE: &str = "kline";

pub const TICKERS_BTCUSDT: &str = "tickers.BTCUSDT";
pub const TICKERS_ETHUSDT: &str = "tickers.ETHUSDT";
pub const TICKERS_TONUSDT: &str = "tickers.TONUSDT";

/// `tickers.<symbol>`
#[must_use]
pub fn tickers(symbol: &str) -> String {
    format!("{TICKERS}.{symbol}")
}

/// `orderbook.<depth>.<symbol>`
#[must_use]
pub fn orderbook(depth: u32, symbol: &str) -> String {
    format!("{ORDERBOOK}.{depth}.{symbol}")
}

/// `publicTrade.<symbol>`
#[must_use]
pub fn public_trade(symbol: &str) -> String {
    format!("{PUBLIC_TRADE}.{symbol}")
}

/// `kline.<interval>.<symbol>`, e.g. interval `1`, `60` or `D`.
#[must_use]
pub fn kline(interval: &str, symbol: &str) -> String {
    format!("{KLINE}.{interval}.{symbol}")
}

/// The stream name of a topic (`tickers` for `tickers.BTCUSDT`).
#[must_use]
pub fn stream_of(topic: &str) -> &str {
    topic.split('.').next().unwrap_or(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_topic_names() {
        assert_eq!(tickers("BTCUSDT"), TICKERS_BTCUSDT);
        assert_eq!(orderbook(50, "ETHUSDT"), "orderbook.50.ETHUSDT");
        assert_eq!(public_trade("TONUSDT"), "publicTrade.TONUSDT");
        assert_eq!(kline("60", "BTCUSDT"), "kline.60.BTCUSDT");
    }

    #[test]
    fn extracts_stream_name() {
        assert_eq!(stream_of("orderbook.1.BTCUSDT"), ORDERBOOK);
        assert_eq!(stream_of("tickers"), TICKERS);
    }
}
