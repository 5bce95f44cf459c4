//! In-process service fakes for engine and command tests.

use super::{
    ImageRequest, ImageService, PollSettings, PollStatus, RateLimiter, Services, TaskHandle,
    TextRequest, TextService,
};
use crate::error::{GenError, Result};
use crate::state::TextOutput;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Completes every task on the first poll; downloads return `image:{task}`.
#[derive(Default)]
pub struct FakeImageService {
    /// Submissions whose prompt contains this text fail.
    pub fail_on: Option<String>,
    /// Raised after this many successful submissions.
    pub cancel_after: Option<(usize, Arc<AtomicBool>)>,
    /// Each submission blocks this long before returning.
    pub submit_delay: Duration,
    pub requests: Mutex<Vec<ImageRequest>>,
    /// Tasks between submit and download.
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeImageService {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn cancelling_after(submissions: usize, flag: Arc<AtomicBool>) -> Self {
        Self {
            cancel_after: Some((submissions, flag)),
            ..Self::default()
        }
    }

    pub fn slow(submit_delay: Duration) -> Self {
        Self {
            submit_delay,
            ..Self::default()
        }
    }

    /// Most tasks that were ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

impl ImageService for FakeImageService {
    fn submit(&self, request: &ImageRequest) -> Result<TaskHandle> {
        if let Some(needle) = &self.fail_on
            && request.prompt.contains(needle.as_str())
        {
            return Err(GenError::Service("submit failed: HTTP 400: rejected".to_string()));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.submit_delay);

        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if let Some((limit, flag)) = &self.cancel_after
            && requests.len() >= *limit
        {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(TaskHandle(format!("task-{}", requests.len())))
    }

    fn poll(&self, handle: &TaskHandle) -> Result<PollStatus> {
        Ok(PollStatus::Done {
            result_uri: format!("fake://{}", handle),
        })
    }

    fn download(&self, uri: &str) -> Result<Vec<u8>> {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let task = uri.trim_start_matches("fake://");
        Ok(format!("image:{}", task).into_bytes())
    }
}

/// Answers every request with a fixed title and body.
pub struct FakeTextService {
    pub title: String,
    pub body: String,
    pub fail: bool,
    pub requests: Mutex<Vec<TextRequest>>,
}

impl Default for FakeTextService {
    fn default() -> Self {
        Self {
            title: "Fresh look".to_string(),
            body: "Made for everyday use.\n#ai #generated".to_string(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTextService {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl TextService for FakeTextService {
    fn generate(&self, request: &TextRequest) -> Result<TextOutput> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(GenError::Service("text generation failed: HTTP 500".to_string()));
        }
        Ok(TextOutput {
            title: self.title.clone(),
            body: self.body.clone(),
        })
    }
}

impl Services {
    /// Services backed by fakes, with no rate limiting and instant polling.
    pub fn fake(image: Option<Arc<FakeImageService>>, text: Option<Arc<FakeTextService>>) -> Self {
        Self {
            image: image.map(|s| s as Arc<dyn ImageService>),
            text: text.map(|s| s as Arc<dyn TextService>),
            limiter: RateLimiter::new(10_000, Duration::from_millis(1)),
            poll: PollSettings {
                initial_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(1),
                max_wait: Duration::from_secs(5),
            },
        }
    }
}
