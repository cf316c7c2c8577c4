use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::state::RateLimitConfig;

/// Sliding-window request limiter keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Record a request from `client_id` and report whether it is within the limit.
    pub fn is_allowed(&self, client_id: &str) -> bool {
        self.is_allowed_at(client_id, Instant::now())
    }

    fn is_allowed_at(&self, client_id: &str, now: Instant) -> bool {
        let mut requests = self.requests.lock();

        // Forget clients whose whole window has expired
        requests.retain(|_, times| {
            times
                .last()
                .is_some_and(|last| now.duration_since(*last) <= self.window)
        });

        let entry = requests.entry(client_id.to_string()).or_default();
        entry.retain(|&time| now.duration_since(time) <= self.window);

        if entry.len() < self.max_requests {
            entry.push(now);
            true
        } else {
            false
        }
    }
}
