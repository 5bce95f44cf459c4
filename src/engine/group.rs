//! Per-group pipeline: images, then copy, then the recorded result.

use super::Engine;
use super::text::{finish_body, sample_examples, text_file_contents};
use crate::error::{GenError, Result};
use crate::events::{Event, EventAction};
use crate::fs::{atomic_write, atomic_write_file};
use crate::plan::GroupSpec;
use crate::services::{ImageRequest, InputImage, TextRequest, wait_for_completion};
use crate::state::{AppendOutcome, GroupResult, GroupStatus, TextOutput, write_group_record};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use std::path::PathBuf;

impl Engine<'_> {
    /// Run one group and persist its terminal result.
    ///
    /// Errors are persistence failures only; service failures end up in the
    /// returned status.
    pub(super) fn run_group(&self, index: usize) -> Result<GroupStatus> {
        let spec = self.plan.group(index).ok_or_else(|| {
            GenError::Persistence(format!("plan has no group {}", index + 1))
        })?;

        let span = tracing::info_span!("group", num = spec.group_num());
        let _enter = span.enter();

        self.store.mark_running(index)?;
        self.events.record(
            Event::new(EventAction::GroupStart)
                .with_group(index)
                .with_details(json!({
                    "prompt_id": spec.prompt_id,
                    "images": spec.images_to_produce,
                })),
        );
        tracing::info!(prompt = %spec.prompt_id, images = spec.images_to_produce, "group started");

        let result = self.produce(spec);
        let status = result.status;

        let (action, details) = match status {
            GroupStatus::Succeeded => (
                EventAction::GroupSucceeded,
                json!({
                    "images": result.produced_image_paths,
                    "text": result.text_output.is_some(),
                }),
            ),
            _ => (
                EventAction::GroupFailed,
                json!({
                    "error": result.error,
                    "images": result.produced_image_paths,
                }),
            ),
        };
        if let Some(error) = &result.error {
            tracing::warn!(error = %error, "group failed");
        } else {
            tracing::info!(images = result.produced_image_paths.len(), "group succeeded");
        }

        if self.store.append_result(result)? == AppendOutcome::Unchanged {
            tracing::debug!("group result already recorded");
        }
        let state = self.store.snapshot()?;
        if let Some(recorded) = state.groups.get(index)
            && let Err(e) = write_group_record(self.ctx, spec, recorded)
        {
            tracing::warn!(error = %e, "failed to write group result.json");
        }
        self.events
            .record(Event::new(action).with_group(index).with_details(details));
        Ok(status)
    }

    /// Produce every artifact of `spec`, stopping at the first failure.
    fn produce(&self, spec: &GroupSpec) -> GroupResult {
        let mut produced = Vec::new();

        if self.plan.template.generation_target.wants_images() {
            for (image_index, prompt) in spec.image_prompts.iter().enumerate() {
                match self.produce_image(spec, image_index, prompt) {
                    Ok(path) => produced.push(path),
                    Err(e) => {
                        return GroupResult::failed(
                            spec.group_index,
                            format!("image {}: {}", image_index + 1, e),
                            produced,
                        );
                    }
                }
            }
        }

        let text = if self.text_active() {
            match self.produce_text(spec) {
                Ok(text) => Some(text),
                Err(e) => {
                    return GroupResult::failed(spec.group_index, format!("text: {}", e), produced);
                }
            }
        } else {
            None
        };

        GroupResult::succeeded(spec.group_index, produced, text)
    }

    /// Generate one image and write it into the group directory.
    ///
    /// Returns the path relative to the run root.
    fn produce_image(&self, spec: &GroupSpec, image_index: usize, prompt: &str) -> Result<PathBuf> {
        let service = self.services.image.as_deref().ok_or_else(|| {
            GenError::Config("no image_service configured".to_string())
        })?;
        let output = &self.plan.template.output;

        let request = ImageRequest {
            prompt: prompt.to_string(),
            input_images: self.input_images(spec),
            aspect_ratio: output.aspect_ratio.clone(),
            resolution: output.resolution.clone(),
            format: output.format.clone(),
        };

        self.services.limiter.acquire()?;
        let handle = service.submit(&request)?;
        tracing::debug!(task = %handle, image = image_index + 1, "task submitted");
        let uri = wait_for_completion(service, &handle, &self.services.poll)?;
        let bytes = service.download(&uri)?;

        let path = self
            .ctx
            .image_path(spec.group_index, image_index, &output.format);
        atomic_write(&path, &bytes)?;
        Ok(self.ctx.relative(&path))
    }

    /// Product items of the group, then its reference item.
    fn input_images(&self, spec: &GroupSpec) -> Vec<InputImage> {
        let products = spec.product_items.iter().map(|id| InputImage {
            identifier: id.clone(),
            path: self.plan.product_path(id),
        });
        let reference = spec.reference_item.iter().map(|id| InputImage {
            identifier: id.clone(),
            path: self.plan.reference_path(id),
        });
        products.chain(reference).collect()
    }

    /// Generate the group's copy and write `text.txt`.
    fn produce_text(&self, spec: &GroupSpec) -> Result<TextOutput> {
        let service = self.services.text.as_deref().ok_or_else(|| {
            GenError::Config("no text_service configured".to_string())
        })?;
        let settings = &self.plan.template.text_generation;

        let mut rng = StdRng::seed_from_u64(self.plan.seed.wrapping_add(spec.group_index as u64));
        let request = TextRequest {
            product_info: self.product_info(),
            examples: sample_examples(&self.examples, &settings.reference_samples, &mut rng),
            scene: spec.prompt_text.clone(),
        };

        let generated = service.generate(&request)?;
        let text = TextOutput {
            title: generated.title,
            body: finish_body(&generated.body, &settings.tags),
        };
        atomic_write_file(
            self.ctx.text_path(spec.group_index),
            &text_file_contents(&text.title, &text.body),
        )?;
        Ok(text)
    }

    /// Template variables overlaid with `text_generation.product_info`.
    fn product_info(&self) -> std::collections::BTreeMap<String, Value> {
        let template = &self.plan.template;
        let mut info = template.template_variables.clone();
        info.extend(template.text_generation.product_info.clone());
        info.entry("product_name".to_string())
            .or_insert_with(|| Value::from(template.name.clone()));
        info
    }
}
