//! Waiting on an asynchronous image task.

use super::types::{PollStatus, TaskHandle};
use super::ImageService;
use crate::config::ImageServiceConfig;
use crate::error::{GenError, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval and overall deadline for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_wait: Duration,
}

impl PollSettings {
    pub const DEFAULT: PollSettings = PollSettings {
        initial_interval: Duration::from_secs(2),
        max_interval: Duration::from_secs(15),
        max_wait: Duration::from_secs(1500),
    };

    pub fn from_config(config: &ImageServiceConfig) -> Self {
        Self {
            initial_interval: Duration::from_secs(config.poll_interval_secs),
            max_interval: Duration::from_secs(config.max_poll_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        }
    }
}

/// Poll `handle` until it finishes, doubling the interval up to the cap.
///
/// Returns the result URI. A failed task or an expired deadline is a
/// `Service` error.
pub fn wait_for_completion(
    service: &dyn ImageService,
    handle: &TaskHandle,
    settings: &PollSettings,
) -> Result<String> {
    let start = Instant::now();
    let mut interval = settings.initial_interval;

    loop {
        match service.poll(handle)? {
            PollStatus::Done { result_uri } => {
                tracing::debug!(
                    task = %handle,
                    elapsed_secs = start.elapsed().as_secs(),
                    "task completed"
                );
                return Ok(result_uri);
            }
            PollStatus::Failed { reason } => {
                return Err(GenError::Service(format!("task {} failed: {}", handle, reason)));
            }
            PollStatus::Pending => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= settings.max_wait {
            return Err(GenError::Service(format!(
                "task {} did not complete within {}s",
                handle,
                settings.max_wait.as_secs()
            )));
        }

        thread::sleep(interval.min(settings.max_wait - elapsed));
        interval = (interval * 2).min(settings.max_interval);
    }
}
