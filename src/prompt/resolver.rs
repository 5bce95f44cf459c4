//! Prompt choice per group.
//!
//! Scene generation: specified ids first, then unused prompts at random,
//! then any prompt except the one used by the previous group. Subject
//! transfer: one prompt for the whole run. A custom template replaces the
//! library in both modes.

use super::library::{PromptDefinition, PromptLibrary};
use crate::config::{GenerationMode, Template};
use crate::error::{GenError, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Id recorded for groups rendered from a custom template.
pub const CUSTOM_PROMPT_ID: &str = "custom";

/// The prompt picked for one group, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenPrompt {
    pub id: String,
    pub template: String,
}

impl From<&PromptDefinition> for ChosenPrompt {
    fn from(def: &PromptDefinition) -> Self {
        Self {
            id: def.id.clone(),
            template: def.template.clone(),
        }
    }
}

/// Resolver progress, recorded in the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptCursor {
    pub specified_consumed: usize,
    pub used: Vec<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Clone)]
enum Policy {
    Custom(ChosenPrompt),
    Transfer {
        specified: Option<ChosenPrompt>,
        chosen: Option<ChosenPrompt>,
    },
    Scene {
        specified: Vec<ChosenPrompt>,
    },
}

#[derive(Debug, Clone)]
pub struct PromptResolver {
    policy: Policy,
    /// Candidates with identical template text collapsed to the first id.
    candidates: Vec<ChosenPrompt>,
    cursor: PromptCursor,
    used_texts: HashSet<String>,
    previous_text: Option<String>,
}

impl PromptResolver {
    /// Build the resolver for `template`.
    ///
    /// `library` may be `None` only when a custom template is configured.
    pub fn new(template: &Template, library: Option<&PromptLibrary>) -> Result<Self> {
        if let Some(custom) = template.custom_template() {
            let chosen = ChosenPrompt {
                id: CUSTOM_PROMPT_ID.to_string(),
                template: custom.to_string(),
            };
            return Ok(Self {
                candidates: vec![chosen.clone()],
                policy: Policy::Custom(chosen),
                cursor: PromptCursor::default(),
                used_texts: HashSet::new(),
                previous_text: None,
            });
        }

        let library = library.ok_or_else(|| {
            GenError::Resource("no prompt library configured".to_string())
        })?;
        if library.is_empty() {
            return Err(GenError::Resource("prompt library has no enabled prompts".to_string()));
        }

        let mut seen = HashSet::new();
        let candidates: Vec<ChosenPrompt> = library
            .prompts()
            .iter()
            .filter(|p| seen.insert(p.template.as_str()))
            .map(ChosenPrompt::from)
            .collect();

        let lookup = |id: &str, field: &str| {
            library.get(id).map(ChosenPrompt::from).ok_or_else(|| {
                GenError::Config(format!("{}: prompt id '{}' not found in library", field, id))
            })
        };

        let policy = match template.mode {
            GenerationMode::SubjectTransfer => {
                let specified = match template
                    .transfer_prompts
                    .as_ref()
                    .and_then(|p| p.specified_prompt.as_deref())
                {
                    Some(id) => Some(lookup(id, "transfer_prompts.specified_prompt")?),
                    None => None,
                };
                Policy::Transfer {
                    specified,
                    chosen: None,
                }
            }
            GenerationMode::SceneGeneration => {
                let ids = template
                    .scene_prompts
                    .as_ref()
                    .map(|p| p.specified_prompts.as_slice())
                    .unwrap_or_default();
                let mut specified: Vec<ChosenPrompt> = Vec::with_capacity(ids.len());
                for id in ids {
                    let prompt = lookup(id, "scene_prompts.specified_prompts")?;
                    if let Some(twin) = specified.iter().find(|p| p.template == prompt.template) {
                        return Err(GenError::Config(format!(
                            "scene_prompts.specified_prompts: '{}' and '{}' have identical text",
                            twin.id, prompt.id
                        )));
                    }
                    specified.push(prompt);
                }
                Policy::Scene { specified }
            }
        };

        Ok(Self {
            policy,
            candidates,
            cursor: PromptCursor::default(),
            used_texts: HashSet::new(),
            previous_text: None,
        })
    }

    /// Number of distinct candidate prompts.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn cursor(&self) -> &PromptCursor {
        &self.cursor
    }

    /// Choose the prompt for the next group in index order.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<ChosenPrompt> {
        let chosen = match &mut self.policy {
            Policy::Custom(prompt) => prompt.clone(),
            Policy::Transfer { specified, chosen } => {
                if chosen.is_none() {
                    *chosen = match specified.clone() {
                        Some(prompt) => Some(prompt),
                        None => self.candidates.choose(rng).cloned(),
                    };
                }
                chosen.clone().ok_or_else(|| {
                    GenError::Resource("prompt library has no enabled prompts".to_string())
                })?
            }
            Policy::Scene { specified } => {
                if let Some(prompt) = specified.get(self.cursor.specified_consumed) {
                    self.cursor.specified_consumed += 1;
                    prompt.clone()
                } else {
                    pick_scene(
                        &self.candidates,
                        &self.used_texts,
                        self.previous_text.as_deref(),
                        rng,
                    )?
                }
            }
        };

        if !self.cursor.used.contains(&chosen.id) {
            self.cursor.used.push(chosen.id.clone());
        }
        self.cursor.previous = Some(chosen.id.clone());
        self.used_texts.insert(chosen.template.clone());
        self.previous_text = Some(chosen.template.clone());
        Ok(chosen)
    }
}

/// Unused prompts first; once exhausted, anything but the previous text.
fn pick_scene<R: Rng + ?Sized>(
    candidates: &[ChosenPrompt],
    used_texts: &HashSet<String>,
    previous_text: Option<&str>,
    rng: &mut R,
) -> Result<ChosenPrompt> {
    let unused: Vec<&ChosenPrompt> = candidates
        .iter()
        .filter(|c| !used_texts.contains(c.template.as_str()))
        .filter(|c| Some(c.template.as_str()) != previous_text)
        .collect();
    if let Some(pick) = unused.choose(rng) {
        return Ok((*pick).clone());
    }

    let others: Vec<&ChosenPrompt> = candidates
        .iter()
        .filter(|c| Some(c.template.as_str()) != previous_text)
        .collect();
    if let Some(pick) = others.choose(rng) {
        return Ok((*pick).clone());
    }

    candidates
        .first()
        .cloned()
        .ok_or_else(|| GenError::Resource("prompt library has no enabled prompts".to_string()))
}
