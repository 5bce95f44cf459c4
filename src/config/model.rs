//! Template and service configuration structs.

use super::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A task template describing one batch run.
///
/// Unknown keys are rejected so that typos never silently fall back to a
/// default selection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    /// Run name; the run directory is `{slug(name)}_{timestamp}`.
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub mode: GenerationMode,

    #[serde(default)]
    pub generation_target: GenerationTarget,

    /// Number of groups to plan.
    pub group_count: u32,

    /// Images generated per group, fixed or `[min, max]`.
    #[serde(default = "default_count_one")]
    pub images_per_group: CountSpec,

    /// Fixed planner seed. When absent the planner draws one from entropy
    /// and records it in `plan.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    pub product_images: ImageSelection,

    /// Required in `subject_transfer` mode, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_images: Option<ImageSelection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_prompts: Option<ScenePrompts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_prompts: Option<TransferPrompts>,

    /// User variables available to prompt templates.
    #[serde(default)]
    pub template_variables: BTreeMap<String, Value>,

    /// Source location overrides keyed by `product_images`,
    /// `reference_images`, `scene_prompts`, `transfer_prompts`, `text_examples`.
    #[serde(default)]
    pub paths: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub text_generation: TextGeneration,

    /// Directory containing the template file; relative paths resolve here.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Selection rule for one image pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,

    #[serde(default = "default_count_one")]
    pub count_per_group: CountSpec,

    #[serde(default)]
    pub selection_mode: SelectionMode,

    /// An item every group must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_include: Option<String>,

    #[serde(default)]
    pub specified_images: Vec<String>,

    /// Percentage of groups (the first ones) that receive `specified_images`.
    #[serde(default = "default_coverage")]
    pub specified_coverage: u8,

    /// Fail on specified identifiers missing from the pool instead of skipping them.
    #[serde(default = "default_true")]
    pub strict: bool,

    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for ImageSelection {
    fn default() -> Self {
        Self {
            source_dir: None,
            count_per_group: default_count_one(),
            selection_mode: SelectionMode::default(),
            must_include: None,
            specified_images: Vec::new(),
            specified_coverage: default_coverage(),
            strict: true,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenePrompts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Prompt ids consumed front-to-back by the first groups.
    #[serde(default)]
    pub specified_prompts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_template: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferPrompts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_template: Option<String>,
}

/// Where and how generated artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    #[serde(default = "default_output_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    #[serde(default = "default_resolution")]
    pub resolution: String,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_max_concurrent_groups")]
    pub max_concurrent_groups: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            base_dir: default_output_base_dir(),
            aspect_ratio: default_aspect_ratio(),
            resolution: default_resolution(),
            format: default_format(),
            max_concurrent_groups: default_max_concurrent_groups(),
        }
    }
}

/// Marketing copy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextGeneration {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tags appended to every generated body.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Free-form product facts forwarded to the text service.
    #[serde(default)]
    pub product_info: BTreeMap<String, Value>,

    /// Few-shot sample count per group.
    #[serde(default = "default_reference_samples")]
    pub reference_samples: CountSpec,

    /// JSON or YAML list of `{title, body}` samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<PathBuf>,
}

impl Default for TextGeneration {
    fn default() -> Self {
        Self {
            enabled: true,
            tags: Vec::new(),
            product_info: BTreeMap::new(),
            reference_samples: default_reference_samples(),
            examples: None,
        }
    }
}

/// External service settings, loaded from `config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_service: Option<ImageServiceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_service: Option<TextServiceConfig>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageServiceConfig {
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_image_model")]
    pub model: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_poll_interval_secs")]
    pub max_poll_interval_secs: u64,

    /// Give up on a task that has not completed after this long.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Public URL prefix under which source images are reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_url_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextServiceConfig {
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_text_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_text_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_text_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Sliding-window limit on image submissions, shared by all groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_requests")]
    pub max_requests: usize,

    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_requests(),
            window_secs: default_rate_limit_window_secs(),
        }
    }
}
