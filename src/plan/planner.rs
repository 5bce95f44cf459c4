//! Group planner: turns a template and its pools into group specs.
//!
//! Planning is pure. It reads the pools and the prompt library, draws from
//! the injected random source, and never touches the run directory or the
//! network. All cursors (sequential position, reference cycle, prompt
//! history) live in the planner for the duration of one call.

use super::reference::ReferencePicker;
use super::types::{GroupSpec, PLAN_VERSION, Plan, PlannerCursors};
use crate::config::{GenerationMode, Template};
use crate::error::{GenError, Result};
use crate::prompt::{PromptLibrary, PromptResolver, RenderContext, render_template};
use crate::resource::{GroupSelector, ResourcePool, SelectionRule};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Everything the planner reads from disk.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub products: ResourcePool,
    /// Loaded in subject transfer mode only.
    pub references: Option<ResourcePool>,
    /// `None` when a custom template replaces the library.
    pub library: Option<PromptLibrary>,
}

impl PlanInputs {
    /// Discover pools and load the prompt library for `template`.
    pub fn load(template: &Template) -> Result<Self> {
        let products = ResourcePool::build(
            &template.product_source()?,
            template.product_images.recursive,
        )?;

        let references = match (&template.mode, &template.reference_images) {
            (GenerationMode::SubjectTransfer, Some(selection)) => Some(ResourcePool::build(
                &template.reference_source()?,
                selection.recursive,
            )?),
            _ => None,
        };

        let library = if template.custom_template().is_some() {
            None
        } else {
            let source = template.prompt_source().ok_or_else(|| {
                GenError::Config(format!("no prompt source configured for {}", template.mode))
            })?;
            Some(PromptLibrary::load(&source)?)
        };

        Ok(Self {
            products,
            references,
            library,
        })
    }
}

/// Groups produced by one planning pass.
#[derive(Debug, Clone)]
pub struct PlannedGroups {
    pub groups: Vec<GroupSpec>,
    pub cursors: PlannerCursors,
    pub warnings: Vec<String>,
}

pub struct Planner<'a> {
    template: &'a Template,
    inputs: &'a PlanInputs,
}

impl<'a> Planner<'a> {
    pub fn new(template: &'a Template, inputs: &'a PlanInputs) -> Self {
        Self { template, inputs }
    }

    /// Plan every group in index order.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PlannedGroups> {
        let template = self.template;
        let group_count = template.group_count as usize;
        let mut warnings = Vec::new();

        let product_rule = SelectionRule::resolve(
            "product_images",
            &template.product_images,
            &self.inputs.products,
            &mut warnings,
        )?;
        let product_specified = product_rule.specified.clone();
        let mut products = GroupSelector::new(product_rule, group_count);

        let mut references = match template.mode {
            GenerationMode::SceneGeneration => None,
            GenerationMode::SubjectTransfer => {
                let pool = self.inputs.references.as_ref().ok_or_else(|| {
                    GenError::Resource("reference images are required in subject_transfer mode".to_string())
                })?;
                let selection = template.reference_images.as_ref().ok_or_else(|| {
                    GenError::Config("subject_transfer mode requires a reference_images section".to_string())
                })?;
                let rule = SelectionRule::resolve("reference_images", selection, pool, &mut warnings)?;
                Some((pool, ReferencePicker::new(rule, &product_specified, group_count)))
            }
        };
        let pair_count = references
            .as_ref()
            .map(|(_, picker)| picker.pair_count())
            .unwrap_or(0);

        let mut resolver = PromptResolver::new(template, self.inputs.library.as_ref())?;
        if template.mode == GenerationMode::SceneGeneration
            && template.custom_template().is_none()
            && resolver.candidate_count() < group_count
        {
            warnings.push(format!(
                "only {} distinct scene prompt(s) for {} groups; prompts will be reused",
                resolver.candidate_count(),
                group_count
            ));
        }

        let reference_count = usize::from(references.is_some());
        let mut wrapped = false;
        let mut groups = Vec::with_capacity(group_count);

        for index in 0..group_count {
            let images_to_produce = template.images_per_group.sample(rng);

            let wraps_before = products.cursor().wraps;
            let product_items = if index < pair_count {
                products.select_paired(&self.inputs.products, &product_specified[index], rng)?
            } else if pair_count > 0 {
                products.select_fallback(&self.inputs.products, rng)?
            } else {
                products.select(&self.inputs.products, index, rng)?
            };
            if !wrapped && products.cursor().wraps > wraps_before {
                wrapped = true;
                tracing::warn!(group = index + 1, "sequential product selection wrapped around the pool");
                warnings.push(format!(
                    "sequential product selection wrapped around the pool at group {}",
                    index + 1
                ));
            }

            let reference_item = match references.as_mut() {
                Some((pool, picker)) => Some(picker.pick(*pool, index, rng)?),
                None => None,
            };

            let prompt = resolver.next(rng)?;
            let image_prompts = (0..images_to_produce)
                .map(|image_index| {
                    let context = RenderContext {
                        group_index: index,
                        image_index,
                        product_count: product_items.len(),
                        reference_count,
                        total_groups: group_count,
                        mode: template.mode,
                    };
                    render_template(&prompt.template, &context.variables(&template.template_variables))
                        .map_err(|e| {
                            GenError::Template(format!(
                                "group {} (prompt '{}'): {}",
                                index + 1,
                                prompt.id,
                                e
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            groups.push(GroupSpec {
                group_index: index,
                product_items,
                reference_item,
                prompt_id: prompt.id,
                prompt_text: image_prompts.first().cloned().unwrap_or_default(),
                image_prompts,
                images_to_produce,
            });
        }

        Ok(PlannedGroups {
            groups,
            cursors: PlannerCursors {
                product: products.cursor(),
                reference: references.map(|(_, picker)| picker.cursor().clone()),
                prompt: resolver.cursor().clone(),
            },
            warnings,
        })
    }
}

/// Plan a run with a seeded random source and wrap it in a [`Plan`].
///
/// The seed comes from the template when set, otherwise from entropy; it is
/// recorded in the plan either way.
pub fn build_plan(template: &Template, inputs: &PlanInputs, run_id: String) -> Result<Plan> {
    let seed = template.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let planned = Planner::new(template, inputs).plan(&mut rng)?;

    tracing::info!(
        run_id = %run_id,
        groups = planned.groups.len(),
        seed,
        "planned run"
    );

    Ok(Plan {
        version: PLAN_VERSION,
        run_id,
        created_at: Utc::now(),
        seed,
        template: template.clone(),
        template_dir: template.base_dir.clone(),
        product_root: inputs.products.root().to_path_buf(),
        reference_root: inputs.references.as_ref().map(|p| p.root().to_path_buf()),
        groups: planned.groups,
        cursors: planned.cursors,
        warnings: planned.warnings,
    })
}
