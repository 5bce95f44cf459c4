//! Retry with exponential backoff for transient HTTP failures.

use crate::config::{ImageServiceConfig, TextServiceConfig};
use rand::Rng;
use std::thread;
use std::time::Duration;

const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
const MAX_LOG_ERROR_CHARS: usize = 512;

/// Failure of a single HTTP call, before it becomes a `GenError::Service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    pub message: String,
    pub status: Option<u16>,
    pub retry_after_ms: Option<u64>,
    /// Expected to clear on its own (connection reset, timeout, garbled answer).
    pub transient: bool,
}

impl CallError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retry_after_ms: None,
            transient: true,
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            retry_after_ms: None,
            transient: false,
        }
    }

    /// A response that arrived but cannot be used; never retried.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retry_after_ms: None,
            transient: false,
        }
    }

    pub fn with_retry_after(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    /// 429, 408, 5xx, and transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.transient
            || self
                .status
                .is_some_and(|code| code == 429 || code == 408 || code >= 500)
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = sanitize_and_truncate_for_log(&self.message);
        match self.status {
            Some(code) => write!(f, "HTTP {}: {}", code, message),
            None => f.write_str(&message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
            max_delay_ms: DEFAULT_MAX_DELAY_MS.max(base_delay_ms),
        }
    }

    pub fn for_image(config: &ImageServiceConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay_ms)
    }

    pub fn for_text(config: &TextServiceConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay_ms)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_for_retry(&self, failed_attempt: u32, error: &CallError) -> Duration {
        if let Some(retry_after_ms) = error.retry_after_ms {
            return Duration::from_millis(retry_after_ms.min(self.max_delay_ms));
        }

        // attempt=1 -> base, attempt=2 -> base*2, attempt=3 -> base*4, capped.
        let exponent = failed_attempt.saturating_sub(1).min(6);
        let multiplier = 1_u64 << exponent;
        let backoff_ms = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);
        let jitter_ms = compute_jitter_ms(backoff_ms);
        Duration::from_millis(backoff_ms.saturating_add(jitter_ms).min(self.max_delay_ms))
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub fn run<T, F>(&self, label: &str, mut call: F) -> Result<T, CallError>
    where
        F: FnMut() -> Result<T, CallError>,
    {
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() || attempt >= self.max_attempts {
                        return Err(error);
                    }
                    let delay = self.delay_for_retry(attempt, &error);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {} ms.",
                        label,
                        attempt,
                        self.max_attempts,
                        error,
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Uniform in `0..backoff_ms / 4`.
fn compute_jitter_ms(backoff_ms: u64) -> u64 {
    let jitter_cap = backoff_ms / 4;
    if jitter_cap == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..jitter_cap)
}

fn sanitize_and_truncate_for_log(input: &str) -> String {
    let mut output = String::new();

    for (count, ch) in input.chars().enumerate() {
        if count >= MAX_LOG_ERROR_CHARS {
            break;
        }
        output.push(if ch.is_control() { ' ' } else { ch });
    }

    let mut compact = output.split_whitespace().collect::<Vec<_>>().join(" ");
    if input.chars().count() > MAX_LOG_ERROR_CHARS {
        compact.push_str(" [truncated]");
    }
    compact
}
