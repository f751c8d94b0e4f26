//! Ping/pong liveness timing.
//!
//! The server pings every `ping_period(pong_wait)` and each pong pushes the
//! read deadline out by a full `pong_wait`. A peer that stays silent for the
//! whole window hits the deadline and its read side terminates.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Ping interval for a given read window: nine tenths of `pong_wait`, so a
/// healthy peer always has time to answer before the deadline.
pub fn ping_period(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}

/// Shortest ping period a ticker will run at.
pub const MIN_PING_PERIOD: Duration = Duration::from_millis(1);

/// Ticker that fires the first ping one full period after creation.
///
/// Periods shorter than [`MIN_PING_PERIOD`] are raised to it.
pub fn ping_interval(period: Duration) -> Interval {
    let period = period.max(MIN_PING_PERIOD);
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Read deadline that only moves forward when a pong arrives.
#[derive(Debug, Clone, Copy)]
pub struct ReadDeadline {
    window: Duration,
    deadline: Instant,
}

impl ReadDeadline {
    /// Start a deadline `window` from now.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: Instant::now() + window,
        }
    }

    /// Push the deadline a full window past now.
    pub fn refresh(&mut self) {
        self.deadline = Instant::now() + self.window;
    }

    /// Instant at which the read side gives up.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Length of the window.
    pub fn window(&self) -> Duration {
        self.window
    }
}
