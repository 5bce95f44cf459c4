//! Plan data model: group specs and the persisted plan document.

use crate::config::Template;
use crate::error::{GenError, Result};
use crate::prompt::PromptCursor;
use crate::resource::SequentialCursor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema version of `plan.json`.
pub const PLAN_VERSION: u32 = 1;

/// One unit of work, fully resolved before execution starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Zero-based position in the plan.
    pub group_index: usize,

    /// Pool identifiers, distinct within the group.
    pub product_items: Vec<String>,

    /// Shared by every image of the group (subject transfer only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_item: Option<String>,

    pub prompt_id: String,

    /// Rendered prompt of the first image.
    pub prompt_text: String,

    /// One rendered prompt per image, `image_prompts.len() == images_to_produce`.
    pub image_prompts: Vec<String>,

    pub images_to_produce: usize,
}

impl GroupSpec {
    /// One-based group number used in directory names and logs.
    pub fn group_num(&self) -> usize {
        self.group_index + 1
    }

    /// Zero-padded group directory name (`001`).
    pub fn dir_name(&self) -> String {
        format!("{:03}", self.group_num())
    }
}

/// Reference picker progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCursor {
    /// Items not yet used in the current cycle, in draw order.
    pub remaining: Vec<String>,
    /// Passes started over the reference pool.
    pub cycles: usize,
}

/// Planner cursor state at the end of planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerCursors {
    pub product: SequentialCursor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceCursor>,
    pub prompt: PromptCursor,
}

/// The persisted plan of one run.
///
/// Resume executes these group specs verbatim; a run is never re-planned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// Seed the planner's random source was built from.
    pub seed: u64,
    pub template: Template,
    /// Directory the template was loaded from.
    pub template_dir: PathBuf,
    pub product_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_root: Option<PathBuf>,
    pub groups: Vec<GroupSpec>,
    pub cursors: PlannerCursors,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn total_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn total_images(&self) -> usize {
        self.groups.iter().map(|g| g.images_to_produce).sum()
    }

    /// Absolute path of a product identifier.
    pub fn product_path(&self, identifier: &str) -> PathBuf {
        self.product_root.join(identifier)
    }

    /// Absolute path of a reference identifier.
    pub fn reference_path(&self, identifier: &str) -> PathBuf {
        self.reference_root
            .as_deref()
            .unwrap_or(Path::new(""))
            .join(identifier)
    }

    pub fn group(&self, index: usize) -> Option<&GroupSpec> {
        self.groups.get(index)
    }

    /// Reject plans written by an incompatible version and restore the
    /// template directory that serde skips.
    pub fn check_loaded(mut self) -> Result<Self> {
        if self.version != PLAN_VERSION {
            return Err(GenError::Persistence(format!(
                "plan.json has version {}, expected {}",
                self.version, PLAN_VERSION
            )));
        }
        for (position, group) in self.groups.iter().enumerate() {
            if group.group_index != position {
                return Err(GenError::Persistence(format!(
                    "plan.json group at position {} has index {}",
                    position, group.group_index
                )));
            }
        }
        self.template.base_dir = self.template_dir.clone();
        Ok(self)
    }
}
