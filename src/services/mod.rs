//! External services: image generation and marketing copy.
//!
//! The engine talks to both through the [`ImageService`] and [`TextService`]
//! traits. The HTTP adapters are the production implementations; tests use
//! in-process fakes.

mod http_image;
mod http_text;
mod poll;
mod rate_limit;
mod retry;
mod types;

#[cfg(test)]
pub mod fake;

use crate::config::{GenerationTarget, ServiceConfig};
use crate::error::{GenError, Result};
use crate::state::TextOutput;
use std::sync::Arc;

pub use http_image::HttpImageService;
pub use http_text::{HttpTextService, compose_prompt};
pub use poll::{PollSettings, wait_for_completion};
pub use rate_limit::RateLimiter;
pub use retry::{CallError, RetryPolicy};
pub use types::{
    FewShotExample, ImageRequest, InputImage, PollStatus, TaskHandle, TextRequest,
};

/// Asynchronous image generation: submit, poll until done, download.
pub trait ImageService: Send + Sync {
    fn submit(&self, request: &ImageRequest) -> Result<TaskHandle>;
    fn poll(&self, handle: &TaskHandle) -> Result<PollStatus>;
    fn download(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Marketing copy generation.
pub trait TextService: Send + Sync {
    fn generate(&self, request: &TextRequest) -> Result<TextOutput>;
}

/// Service handles shared by every worker of a run.
pub struct Services {
    pub image: Option<Arc<dyn ImageService>>,
    pub text: Option<Arc<dyn TextService>>,
    pub limiter: RateLimiter,
    pub poll: PollSettings,
}

impl Services {
    /// Build the HTTP adapters for the sections present in `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let image = match &config.image_service {
            Some(c) => Some(Arc::new(HttpImageService::new(c)?) as Arc<dyn ImageService>),
            None => None,
        };
        let text = match &config.text_service {
            Some(c) => Some(Arc::new(HttpTextService::new(c)?) as Arc<dyn TextService>),
            None => None,
        };
        let poll = config
            .image_service
            .as_ref()
            .map(PollSettings::from_config)
            .unwrap_or(PollSettings::DEFAULT);

        Ok(Self {
            image,
            text,
            limiter: RateLimiter::from_config(&config.rate_limit),
            poll,
        })
    }

    /// Check that every artifact `target` asks for has a service behind it.
    pub fn check_for(&self, target: GenerationTarget, text_enabled: bool) -> Result<()> {
        if target.wants_images() && self.image.is_none() {
            return Err(GenError::Config(
                "generation_target needs images but the service config has no image_service"
                    .to_string(),
            ));
        }
        if target == GenerationTarget::Text && (self.text.is_none() || !text_enabled) {
            return Err(GenError::Config(
                "generation_target is text but text generation is disabled or has no text_service"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
