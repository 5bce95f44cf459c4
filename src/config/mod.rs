//! Configuration model for batchgen.
//!
//! Two documents are loaded here: the task template (`-t`), which says what
//! to plan, and the service config (`-c`), which says where to send work.
//! Both reject unknown keys and fill optional fields with defaults.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::{
    ImageSelection, ImageServiceConfig, OutputSettings, RateLimitConfig, ScenePrompts,
    ServiceConfig, Template, TextGeneration, TextServiceConfig, TransferPrompts,
};
pub use operations::{IMAGE_API_KEY_ENV, TEXT_API_KEY_ENV};
pub use types::{CountSpec, GenerationMode, GenerationTarget, SelectionMode};
