//! Plan, manifest, and per-group documents of a run directory.

use super::types::{GroupResult, RunState, StatusCounts};
use crate::config::GenerationMode;
use crate::context::RunContext;
use crate::error::{GenError, Result};
use crate::fs::{atomic_write_file, atomic_write_json};
use crate::plan::{GroupSpec, Plan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Write `plan.json`.
pub fn write_plan(ctx: &RunContext, plan: &Plan) -> Result<()> {
    atomic_write_json(ctx.plan_path(), plan)
}

/// Read and check `plan.json`.
pub fn read_plan(ctx: &RunContext) -> Result<Plan> {
    let path = ctx.plan_path();
    let content = std::fs::read_to_string(&path).map_err(|e| {
        GenError::Persistence(format!("failed to read '{}': {}", path.display(), e))
    })?;
    let plan: Plan = serde_json::from_str(&content).map_err(|e| {
        GenError::Persistence(format!("failed to parse '{}': {}", path.display(), e))
    })?;
    plan.check_loaded()
}

/// `results.json`: summary counts plus every group's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsManifest {
    pub run_id: String,
    pub template_name: String,
    pub mode: GenerationMode,
    pub completed_at: DateTime<Utc>,
    pub total_groups: usize,
    pub total_images: usize,
    pub counts: StatusCounts,
    pub groups: Vec<GroupResult>,
}

impl ResultsManifest {
    pub fn from_state(state: &RunState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            template_name: state.template_name.clone(),
            mode: state.mode,
            completed_at: Utc::now(),
            total_groups: state.total_groups,
            total_images: state.produced_images(),
            counts: state.counts(),
            groups: state.groups.clone(),
        }
    }

    /// CSV report, one row per group in plan order. Image paths are joined
    /// with `;` in a single column.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("group,status,attempts,images,title,error\r\n");
        for group in &self.groups {
            let images = group
                .produced_image_paths
                .iter()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .collect::<Vec<_>>()
                .join(";");
            let title = group.text_output.as_ref().map(|t| t.title.as_str());
            let row = [
                format!("{:03}", group.group_index + 1),
                group.status.to_string(),
                group.attempts.to_string(),
                csv_field(&images),
                csv_field(title.unwrap_or_default()),
                csv_field(group.error.as_deref().unwrap_or_default()),
            ];
            out.push_str(&row.join(","));
            out.push_str("\r\n");
        }
        out
    }
}

/// Quote a field when it holds a separator, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write `results.json` and its `results.csv` rendering.
pub fn write_results(ctx: &RunContext, state: &RunState) -> Result<ResultsManifest> {
    let manifest = ResultsManifest::from_state(state);
    atomic_write_json(ctx.results_path(), &manifest)?;
    atomic_write_file(ctx.results_csv_path(), &manifest.to_csv())?;
    Ok(manifest)
}

/// `result.json` inside a group directory: what was planned and what came out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub spec: GroupSpec,
    pub result: GroupResult,
}

pub fn write_group_record(ctx: &RunContext, spec: &GroupSpec, result: &GroupResult) -> Result<()> {
    let record = GroupRecord {
        spec: spec.clone(),
        result: result.clone(),
    };
    atomic_write_json(ctx.group_result_path(spec.group_index), &record)
}
