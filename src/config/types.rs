//! Configuration enums, value types, and serde default functions.

use crate::error::{GenError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of images a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Product images placed into newly generated scenes.
    SceneGeneration,
    /// Product subject transferred into a reference image.
    SubjectTransfer,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::SceneGeneration => "scene_generation",
            GenerationMode::SubjectTransfer => "subject_transfer",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which artifacts each group produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTarget {
    /// Images only.
    Image,
    /// Marketing copy only.
    Text,
    /// Images followed by marketing copy (default).
    #[default]
    Both,
}

impl GenerationTarget {
    pub fn wants_images(&self) -> bool {
        matches!(self, GenerationTarget::Image | GenerationTarget::Both)
    }

    pub fn wants_text(&self) -> bool {
        matches!(self, GenerationTarget::Text | GenerationTarget::Both)
    }
}

/// How items are drawn from a resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Uniform sampling without replacement (default).
    #[default]
    Random,
    /// Next items in stable pool order, wrapping when exhausted.
    Sequential,
    /// The literal `specified_images` list.
    Specified,
}

/// A count that is either fixed or sampled uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountSpec {
    Fixed(u32),
    Range([u32; 2]),
}

impl CountSpec {
    pub fn min(&self) -> u32 {
        match self {
            CountSpec::Fixed(n) => *n,
            CountSpec::Range([lo, _]) => *lo,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            CountSpec::Fixed(n) => *n,
            CountSpec::Range([_, hi]) => *hi,
        }
    }

    /// Resolve the count, drawing once from the inclusive range if needed.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self {
            CountSpec::Fixed(n) => *n as usize,
            CountSpec::Range([lo, hi]) if lo >= hi => *lo as usize,
            CountSpec::Range([lo, hi]) => rng.gen_range(*lo..=*hi) as usize,
        }
    }

    /// Check that the count is usable; `allow_zero` permits `0` as minimum.
    pub fn check(&self, field: &str, allow_zero: bool) -> Result<()> {
        if let CountSpec::Range([lo, hi]) = self
            && lo > hi
        {
            return Err(GenError::Config(format!(
                "{} range [{}, {}] has min greater than max",
                field, lo, hi
            )));
        }
        if !allow_zero && self.min() == 0 {
            return Err(GenError::Config(format!(
                "{} must be at least 1",
                field
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountSpec::Fixed(n) => write!(f, "{}", n),
            CountSpec::Range([lo, hi]) => write!(f, "[{}, {}]", lo, hi),
        }
    }
}

// Default value functions for serde
pub(crate) fn default_count_one() -> CountSpec {
    CountSpec::Fixed(1)
}
pub(crate) fn default_reference_samples() -> CountSpec {
    CountSpec::Range([3, 5])
}
pub(crate) fn default_coverage() -> u8 {
    100
}
pub(crate) fn default_true() -> bool {
    true
}
pub(crate) fn default_output_base_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./outputs")
}
pub(crate) fn default_aspect_ratio() -> String {
    "4:5".to_string()
}
pub(crate) fn default_resolution() -> String {
    "2K".to_string()
}
pub(crate) fn default_format() -> String {
    "png".to_string()
}
pub(crate) fn default_max_concurrent_groups() -> usize {
    3
}
pub(crate) fn default_image_model() -> String {
    "nano-banana-pro".to_string()
}
pub(crate) fn default_text_model() -> String {
    "google/gemini-3-flash-preview".to_string()
}
pub(crate) fn default_poll_interval_secs() -> u64 {
    2
}
pub(crate) fn default_max_poll_interval_secs() -> u64 {
    15
}
pub(crate) fn default_max_wait_secs() -> u64 {
    1500
}
pub(crate) fn default_request_timeout_secs() -> u64 {
    30
}
pub(crate) fn default_text_timeout_secs() -> u64 {
    60
}
pub(crate) fn default_max_retries() -> u32 {
    3
}
pub(crate) fn default_retry_delay_ms() -> u64 {
    1000
}
pub(crate) fn default_text_retry_delay_ms() -> u64 {
    2000
}
pub(crate) fn default_temperature() -> f32 {
    0.8
}
pub(crate) fn default_rate_limit_requests() -> usize {
    20
}
pub(crate) fn default_rate_limit_window_secs() -> u64 {
    10
}
