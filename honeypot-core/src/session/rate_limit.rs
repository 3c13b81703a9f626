//! Per-session pacing of model calls

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Enforces a minimum delay between two model calls for the same session.
/// There is no global cap; sessions never affect each other.
#[derive(Debug)]
pub struct RateLimiter {
    last_call: Mutex<HashMap<String, Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(HashMap::new()),
            min_interval,
        }
    }

    /// Build from a delay in (possibly fractional) seconds. Negative or
    /// non-finite values disable pacing.
    pub fn from_secs_f64(secs: f64) -> Self {
        let interval = if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        Self::new(interval)
    }

    /// Whether a call for `session_id` may go out now
    pub fn allow(&self, session_id: &str) -> bool {
        self.allow_at(session_id, Instant::now())
    }

    pub fn allow_at(&self, session_id: &str, now: Instant) -> bool {
        match self.last_call.lock().get(session_id) {
            Some(last) => now.saturating_duration_since(*last) >= self.min_interval,
            None => true,
        }
    }

    /// Remember that a call went out for `session_id` at `at`
    pub fn record(&self, session_id: &str, at: Instant) {
        self.last_call.lock().insert(session_id.to_string(), at);
    }

    pub fn forget(&self, session_id: &str) {
        self.last_call.lock().remove(session_id);
    }

    /// Keep only entries whose session id satisfies `keep`
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.last_call.lock().retain(|id, _| keep(id));
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn len(&self) -> usize {
        self.last_call.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_call.lock().is_empty()
    }
}
