//! Template and service config loading, validation, and path resolution.

use super::model::{ImageSelection, ServiceConfig, Template};
use super::types::{CountSpec, GenerationMode, SelectionMode};
use crate::error::{GenError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable overriding `image_service.api_key`.
pub const IMAGE_API_KEY_ENV: &str = "BATCHGEN_IMAGE_API_KEY";

/// Environment variable overriding `text_service.api_key`.
pub const TEXT_API_KEY_ENV: &str = "BATCHGEN_TEXT_API_KEY";

impl Template {
    /// Load a template from a YAML or JSON file.
    ///
    /// Relative paths inside the template resolve against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            GenError::Config(format!(
                "failed to read template '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut template = Self::parse(&content)?;
        template.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        template.validate()?;
        Ok(template)
    }

    /// Parse and validate a template from a YAML (or JSON) string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let template = Self::parse(yaml)?;
        template.validate()?;
        Ok(template)
    }

    fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| GenError::Config(format!("failed to parse template: {}", e)))
    }

    /// Validate the template, reporting every problem in one error.
    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GenError::Config(errors.join("; ")))
        }
    }

    /// Collect all static validation problems.
    ///
    /// Checks that need the discovered pools (counts against pool sizes,
    /// identifier resolution) run during planning.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if self.group_count == 0 {
            errors.push("group_count must be at least 1".to_string());
        }
        if let Err(e) = self.images_per_group.check("images_per_group", false) {
            errors.push(strip_prefix(e));
        }
        if self.output.max_concurrent_groups == 0 {
            errors.push("output.max_concurrent_groups must be at least 1".to_string());
        }
        if self.output.format.trim().is_empty() {
            errors.push("output.format must not be empty".to_string());
        }
        if let Err(e) = self
            .text_generation
            .reference_samples
            .check("text_generation.reference_samples", true)
        {
            errors.push(strip_prefix(e));
        }

        let product_mandatory = if self.is_paired() {
            paired_mandatory_count(&self.product_images)
        } else {
            mandatory_count(&self.product_images)
        };
        check_selection(
            "product_images",
            &self.product_images,
            Some(product_mandatory),
            &mut errors,
        );

        match self.mode {
            GenerationMode::SceneGeneration => match &self.scene_prompts {
                None => errors.push("scene_generation mode requires a scene_prompts section".to_string()),
                Some(prompts) => {
                    if prompts.custom_template.is_none()
                        && prompts.source.is_none()
                        && !self.paths.contains_key("scene_prompts")
                    {
                        errors.push(
                            "scene_prompts needs either a source or a custom_template".to_string(),
                        );
                    }
                    if let Some(dup) = first_duplicate(&prompts.specified_prompts) {
                        errors.push(format!(
                            "scene_prompts.specified_prompts lists '{}' more than once",
                            dup
                        ));
                    }
                }
            },
            GenerationMode::SubjectTransfer => {
                match &self.reference_images {
                    None => errors.push(
                        "subject_transfer mode requires a reference_images section".to_string(),
                    ),
                    Some(reference) => {
                        check_selection("reference_images", reference, None, &mut errors);
                        if reference.count_per_group != CountSpec::Fixed(1) {
                            errors.push(
                                "reference_images.count_per_group must be 1 (one reference per group)"
                                    .to_string(),
                            );
                        }
                        if reference.must_include.is_some() {
                            errors.push(
                                "reference_images.must_include is not supported; use specified_images"
                                    .to_string(),
                            );
                        }
                    }
                }
                match &self.transfer_prompts {
                    None => errors.push(
                        "subject_transfer mode requires a transfer_prompts section".to_string(),
                    ),
                    Some(prompts) => {
                        if prompts.custom_template.is_none()
                            && prompts.source.is_none()
                            && !self.paths.contains_key("transfer_prompts")
                        {
                            errors.push(
                                "transfer_prompts needs either a source or a custom_template"
                                    .to_string(),
                            );
                        }
                    }
                }
            }
        }

        errors
    }

    /// Whether product and reference specified lists are zipped into pairs.
    pub fn is_paired(&self) -> bool {
        self.mode == GenerationMode::SubjectTransfer
            && !self.product_images.specified_images.is_empty()
            && self
                .reference_images
                .as_ref()
                .is_some_and(|r| !r.specified_images.is_empty())
    }

    /// Resolve a path relative to the template directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// A `paths` override wins over the section's own location.
    fn source_path(&self, key: &str, configured: Option<&PathBuf>) -> Option<PathBuf> {
        self.paths
            .get(key)
            .or(configured)
            .map(|p| self.resolve_path(p))
    }

    /// Root directory of the product image pool.
    pub fn product_source(&self) -> Result<PathBuf> {
        self.source_path("product_images", self.product_images.source_dir.as_ref())
            .ok_or_else(|| GenError::Config("product_images.source_dir is not set".to_string()))
    }

    /// Root directory of the reference image pool (subject transfer only).
    pub fn reference_source(&self) -> Result<PathBuf> {
        let configured = self
            .reference_images
            .as_ref()
            .and_then(|r| r.source_dir.as_ref());
        self.source_path("reference_images", configured)
            .ok_or_else(|| GenError::Config("reference_images.source_dir is not set".to_string()))
    }

    /// Prompt library location for the active mode, if any.
    pub fn prompt_source(&self) -> Option<PathBuf> {
        match self.mode {
            GenerationMode::SceneGeneration => self.source_path(
                "scene_prompts",
                self.scene_prompts.as_ref().and_then(|p| p.source.as_ref()),
            ),
            GenerationMode::SubjectTransfer => self.source_path(
                "transfer_prompts",
                self.transfer_prompts.as_ref().and_then(|p| p.source.as_ref()),
            ),
        }
    }

    /// Literal prompt template that bypasses the prompt library.
    pub fn custom_template(&self) -> Option<&str> {
        match self.mode {
            GenerationMode::SceneGeneration => self
                .scene_prompts
                .as_ref()
                .and_then(|p| p.custom_template.as_deref()),
            GenerationMode::SubjectTransfer => self
                .transfer_prompts
                .as_ref()
                .and_then(|p| p.custom_template.as_deref()),
        }
    }

    /// Few-shot example file for text generation.
    pub fn text_examples_path(&self) -> Option<PathBuf> {
        self.source_path("text_examples", self.text_generation.examples.as_ref())
    }

    /// Directory under which run directories are created.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output.base_dir)
    }
}

/// `mandatory` is the number of items forced into a group, `None` when the
/// pool contributes a single item per group regardless of its lists.
fn check_selection(
    field: &str,
    selection: &ImageSelection,
    mandatory: Option<usize>,
    errors: &mut Vec<String>,
) {
    if let Err(e) = selection
        .count_per_group
        .check(&format!("{}.count_per_group", field), false)
    {
        errors.push(strip_prefix(e));
    }
    if selection.specified_coverage > 100 {
        errors.push(format!(
            "{}.specified_coverage must be between 0 and 100 (found {})",
            field, selection.specified_coverage
        ));
    }
    if let Some(dup) = first_duplicate(&selection.specified_images) {
        errors.push(format!(
            "{}.specified_images lists '{}' more than once",
            field, dup
        ));
    }

    match selection.selection_mode {
        SelectionMode::Specified => {
            if selection.specified_images.is_empty() {
                errors.push(format!(
                    "{}.selection_mode is 'specified' but specified_images is empty",
                    field
                ));
            }
        }
        SelectionMode::Random | SelectionMode::Sequential => {
            let min = selection.count_per_group.min() as usize;
            if let Some(mandatory) = mandatory
                && mandatory > min
            {
                errors.push(format!(
                    "{}: {} mandatory item(s) do not fit in count_per_group minimum of {}",
                    field, mandatory, min
                ));
            }
        }
    }
}

/// Number of distinct items forced into a covered group.
fn mandatory_count(selection: &ImageSelection) -> usize {
    let extra = match &selection.must_include {
        Some(item) if !selection.specified_images.contains(item) => 1,
        _ => 0,
    };
    selection.specified_images.len() + extra
}

/// Items forced into a paired group: `must_include` plus the paired item.
fn paired_mandatory_count(selection: &ImageSelection) -> usize {
    match &selection.must_include {
        Some(_) => 2,
        None => 1,
    }
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    items
        .iter()
        .find(|item| !seen.insert(item.as_str()))
        .map(String::as_str)
}

fn strip_prefix(err: GenError) -> String {
    match err {
        GenError::Config(msg) => msg,
        other => other.to_string(),
    }
}

impl ServiceConfig {
    /// Load service config from a YAML file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            GenError::Config(format!(
                "failed to read service config '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse and validate service config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GenError::Config(format!("failed to parse service config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Replace API keys with values from `lookup` when present and non-empty.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(image) = self.image_service.as_mut()
            && let Some(key) = lookup(IMAGE_API_KEY_ENV).filter(|k| !k.is_empty())
        {
            image.api_key = key;
        }
        if let Some(text) = self.text_service.as_mut()
            && let Some(key) = lookup(TEXT_API_KEY_ENV).filter(|k| !k.is_empty())
        {
            text.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(image) = &self.image_service {
            check_url("image_service.base_url", &image.base_url)?;
            if image.poll_interval_secs == 0 {
                return Err(GenError::Config(
                    "image_service.poll_interval_secs must be greater than 0".to_string(),
                ));
            }
            if image.max_poll_interval_secs < image.poll_interval_secs {
                return Err(GenError::Config(
                    "image_service.max_poll_interval_secs must not be below poll_interval_secs"
                        .to_string(),
                ));
            }
            if let Some(prefix) = &image.input_url_prefix {
                check_url("image_service.input_url_prefix", prefix)?;
            }
        }
        if let Some(text) = &self.text_service {
            check_url("text_service.base_url", &text.base_url)?;
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(GenError::Config(
                "rate_limit.max_requests and rate_limit.window_secs must be greater than 0"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn check_url(field: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| GenError::Config(format!("{} '{}' is not a valid URL: {}", field, value, e)))
}
