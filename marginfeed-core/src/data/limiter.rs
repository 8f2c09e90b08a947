//! Minimum-interval rate limiter for provider calls.
//!
//! The provider enforces per-minute call quotas. The limiter spaces calls at
//! least `min_interval` apart; `acquire()` sleeps out the remainder before
//! recording the call.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Paces provider calls to a minimum interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Default pacing: a 500 calls/minute quota leaves 120ms between calls.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_millis(120))
    }

    /// Block until a call is allowed, then record it.
    pub fn acquire(&self) {
        let mut last = self.last_call.lock().unwrap();
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    /// Time until the next call would be allowed (zero if allowed now).
    pub fn remaining(&self) -> Duration {
        let last = self.last_call.lock().unwrap();
        match *last {
            None => Duration::ZERO,
            Some(prev) => self.min_interval.saturating_sub(prev.elapsed()),
        }
    }
}
