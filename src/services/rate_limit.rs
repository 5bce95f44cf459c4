//! Sliding-window rate limiter shared by all workers.

use crate::config::RateLimitConfig;
use crate::error::{GenError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Allows at most `max_requests` acquisitions in any `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            issued: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Block until a request may be sent, then record it.
    pub fn acquire(&self) -> Result<()> {
        loop {
            let wait = {
                let mut issued = self
                    .issued
                    .lock()
                    .map_err(|_| GenError::Service("rate limiter lock poisoned".to_string()))?;
                let now = Instant::now();
                while issued
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    issued.pop_front();
                }
                if issued.len() < self.max_requests {
                    issued.push_back(now);
                    return Ok(());
                }
                match issued.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            thread::sleep(wait);
        }
    }
}
