use crate::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_REPLY_TIMEOUT, DEFAULT_SI_TOLERANCE, DEFAULT_UNLOCK_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};
use std::time::Duration;

/// Tunables of a [`Brick`](crate::Brick).
#[derive(Debug, Clone, PartialEq)]
pub struct BrickConfig {
    /// Pause between two polls of the port table. Zero disables polling.
    pub poll_interval: Duration,
    /// How long a reply-expecting command waits for the brick.
    pub reply_timeout: Duration,
    /// SI readings closer than this to the previous value count as unchanged.
    pub si_tolerance: f32,
    /// Raise a change notification after every poll, changed or not.
    pub always_send_events: bool,
    pub write_timeout: Duration,
    pub unlock_timeout: Duration,
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            si_tolerance: DEFAULT_SI_TOLERANCE,
            always_send_events: false,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            unlock_timeout: DEFAULT_UNLOCK_TIMEOUT,
        }
    }
}

impl BrickConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_si_tolerance(mut self, tolerance: f32) -> Self {
        self.si_tolerance = tolerance;
        self
    }

    pub fn with_always_send_events(mut self, always: bool) -> Self {
        self.always_send_events = always;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_unlock_timeout(mut self, timeout: Duration) -> Self {
        self.unlock_timeout = timeout;
        self
    }
}
