//! Run state data model.

use crate::config::GenerationMode;
use crate::plan::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Schema version of `state.json`.
pub const STATE_VERSION: u32 = 1;

/// Lifecycle of one group: `pending -> running -> {succeeded, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl GroupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GroupStatus::Succeeded | GroupStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Pending => "pending",
            GroupStatus::Running => "running",
            GroupStatus::Succeeded => "succeeded",
            GroupStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Title and body produced by the text service for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOutput {
    pub title: String,
    pub body: String,
}

/// Outcome of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    pub group_index: usize,
    pub status: GroupStatus,

    /// Image artifacts, relative to the run directory.
    #[serde(default)]
    pub produced_image_paths: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_output: Option<TextOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of times execution of this group started.
    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl GroupResult {
    pub fn pending(group_index: usize) -> Self {
        Self {
            group_index,
            status: GroupStatus::Pending,
            produced_image_paths: Vec::new(),
            text_output: None,
            error: None,
            attempts: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn succeeded(
        group_index: usize,
        produced_image_paths: Vec<PathBuf>,
        text_output: Option<TextOutput>,
    ) -> Self {
        Self {
            status: GroupStatus::Succeeded,
            produced_image_paths,
            text_output,
            finished_at: Some(Utc::now()),
            ..Self::pending(group_index)
        }
    }

    /// A failed group keeps whatever artifacts were produced before the error.
    pub fn failed(
        group_index: usize,
        error: impl Into<String>,
        produced_image_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            status: GroupStatus::Failed,
            produced_image_paths,
            error: Some(error.into()),
            finished_at: Some(Utc::now()),
            ..Self::pending(group_index)
        }
    }
}

/// Group counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Persisted state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub version: u32,
    pub run_id: String,
    pub template_name: String,
    pub mode: GenerationMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_groups: usize,
    /// One entry per planned group, in index order.
    pub groups: Vec<GroupResult>,
}

impl RunState {
    /// Fresh state for `plan` with every group pending.
    pub fn new(plan: &Plan) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            run_id: plan.run_id.clone(),
            template_name: plan.template.name.clone(),
            mode: plan.template.mode,
            created_at: now,
            updated_at: now,
            total_groups: plan.total_groups(),
            groups: (0..plan.total_groups()).map(GroupResult::pending).collect(),
        }
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for group in &self.groups {
            match group.status {
                GroupStatus::Pending => counts.pending += 1,
                GroupStatus::Running => counts.running += 1,
                GroupStatus::Succeeded => counts.succeeded += 1,
                GroupStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Indices of groups that still need to run, in order.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Pending)
            .map(|g| g.group_index)
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &GroupResult> {
        self.groups.iter().filter(|g| g.status == GroupStatus::Failed)
    }

    pub fn is_complete(&self) -> bool {
        self.groups.iter().all(|g| g.status.is_terminal())
    }

    pub fn produced_images(&self) -> usize {
        self.groups.iter().map(|g| g.produced_image_paths.len()).sum()
    }
}
