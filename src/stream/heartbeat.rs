//! Application-level heartbeat.
//!
//! Bybit drops connections that stay idle; a `ping` op frame is sent right
//! after connecting and then on a fixed period. The supervising loop owns
//! the [`Heartbeat`] and performs the write itself, so heartbeat writes are
//! serialized with every other write on the connection.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{trace, Span};

use super::transport::Frame;

/// Default heartbeat period.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);

/// Periodic liveness frame source for one connection.
pub struct Heartbeat {
    interval: Interval,
    frame: Frame,
    sent: u64,
    span: Span,
}

impl Heartbeat {
    /// Start a heartbeat whose first tick fires one full `period` from now.
    ///
    /// The immediate frame sent on connect is the caller's job (see
    /// [`Heartbeat::frame`]); the timer only covers the periodic ones.
    #[must_use]
    pub fn start(period: Duration, frame: Frame, span: Span) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            interval,
            frame,
            sent: 0,
            span,
        }
    }

    /// The serialized ping frame.
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.frame.clone()
    }

    /// Wait for the next period and return the frame to send.
    pub async fn tick(&mut self) -> Frame {
        self.interval.tick().await;
        self.sent += 1;
        self.span
            .in_scope(|| trace!(beat = self.sent, "Heartbeat due"));
        self.frame()
    }

    /// Number of periodic beats produced so far.
    #[must_use]
    pub const fn beats(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::messages::PingRequest;

    fn ping() -> Frame {
        PingRequest::new("100001").to_frame().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_period() {
        let start = Instant::now();
        let mut heartbeat = Heartbeat::start(Duration::from_secs(20), ping(), Span::none());

        heartbeat.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(20));

        heartbeat.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(40));
        assert_eq!(heartbeat.beats(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_beat_before_the_first_period() {
        let mut heartbeat = Heartbeat::start(Duration::from_secs(20), ping(), Span::none());
        {
            let mut tick = tokio_test::task::spawn(heartbeat.tick());
            tokio_test::assert_pending!(tick.poll());
        }
        assert_eq!(heartbeat.beats(), 0);

        tokio::time::advance(Duration::from_secs(19)).await;
        {
            let mut tick = tokio_test::task::spawn(heartbeat.tick());
            tokio_test::assert_pending!(tick.poll());
        }
        assert_eq!(heartbeat.beats(), 0);
    }

    #[tokio::test]
    async fn frame_is_a_ping_op() {
        let heartbeat = Heartbeat::start(DEFAULT_PING_INTERVAL, ping(), Span::none());
        assert_eq!(
            heartbeat.frame(),
            Frame::Text(r#"{"reqId":"100001","op":"ping"}"#.into())
        );
    }
}
