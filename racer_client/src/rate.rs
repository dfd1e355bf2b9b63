//! Send-rate gate.

use std::time::{Duration, Instant};

use racer_shared::net::hz_to_period;

/// Lets at most one send through per period of a monotonic clock,
/// independent of how often it is asked.
#[derive(Debug, Clone)]
pub struct SendGate {
    period: Duration,
    last: Option<Instant>,
}

impl SendGate {
    pub fn new(hz: u32) -> Self {
        Self {
            period: hz_to_period(hz),
            last: None,
        }
    }

    /// Returns true, and starts a new period, if the last accepted send was
    /// at least one period before `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
