// Per-client sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Allows at most `max_requests` per `window` for each client IP.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `client`.
    ///
    /// Returns `Err(retry_after)` when the client is over its budget; a
    /// rejected request is not counted.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");
        let window = hits.entry(client).or_default();

        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_requests {
            let retry_after = window
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.window);
            debug!(%client, ?retry_after, "rate limit exceeded");
            return Err(retry_after);
        }

        window.push_back(now);
        Ok(())
    }

    /// Drop clients with no hits inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");
        hits.retain(|_, window| {
            window
                .back()
                .is_some_and(|&last| now.duration_since(last) < self.window)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().expect("rate limiter mutex poisoned").len()
    }
}

/// Whole seconds for a `Retry-After` header, never less than 1.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
