//! Human-readable plan and run summaries.

use crate::context::RunContext;
use crate::engine::ExecutionSummary;
use crate::plan::Plan;
use crate::state::ResultsManifest;
use std::fmt::Write as _;

/// Widest product column before it is shortened.
const PRODUCTS_WIDTH: usize = 40;

/// Header lines shared by the full plan and the pre-run summary.
fn plan_header(plan: &Plan) -> String {
    let template = &plan.template;
    let mut out = String::new();
    let _ = writeln!(out, "Plan: {}", plan.run_id);
    let _ = writeln!(
        out,
        "  template: {} ({}, target {})",
        template.name,
        template.mode,
        format!("{:?}", template.generation_target).to_lowercase()
    );
    let _ = writeln!(
        out,
        "  groups: {}, images: {}, seed: {}",
        plan.total_groups(),
        plan.total_images(),
        plan.seed
    );
    out
}

fn warnings(plan: &Plan) -> String {
    let mut out = String::new();
    if !plan.warnings.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for warning in &plan.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }
    out
}

/// Full plan with one row per group, as shown by `run --dry-run`.
pub fn format_plan(plan: &Plan) -> String {
    let mut out = plan_header(plan);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>5}  {:<width$}  {:<20}  {:<16}  {:>6}",
        "group",
        "products",
        "reference",
        "prompt",
        "images",
        width = PRODUCTS_WIDTH
    );
    for group in &plan.groups {
        let _ = writeln!(
            out,
            "{:>5}  {:<width$}  {:<20}  {:<16}  {:>6}",
            group.dir_name(),
            shorten(&group.product_items.join(", "), PRODUCTS_WIDTH),
            shorten(group.reference_item.as_deref().unwrap_or("-"), 20),
            shorten(&group.prompt_id, 16),
            group.images_to_produce,
            width = PRODUCTS_WIDTH
        );
    }
    let warnings = warnings(plan);
    if !warnings.is_empty() {
        let _ = writeln!(out);
        out.push_str(&warnings);
    }
    out
}

/// Header and warnings only, printed before a run starts.
pub fn format_plan_summary(plan: &Plan) -> String {
    let mut out = plan_header(plan);
    out.push_str(&warnings(plan));
    out
}

/// Outcome of one `run` or `resume` invocation.
pub fn format_run_summary(
    ctx: &RunContext,
    summary: &ExecutionSummary,
    manifest: &ResultsManifest,
) -> String {
    let counts = &manifest.counts;
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Executed {} group(s): {} succeeded, {} failed",
        summary.succeeded + summary.failed,
        summary.succeeded,
        summary.failed
    );
    if summary.cancelled {
        let _ = writeln!(
            out,
            "Interrupted: {} group(s) were not started",
            summary.not_started
        );
    }
    let _ = writeln!(
        out,
        "Run total: {}/{} succeeded, {} failed, {} pending, {} image(s)",
        counts.succeeded,
        manifest.total_groups,
        counts.failed,
        counts.pending + counts.running,
        manifest.total_images
    );
    let failed: Vec<_> = manifest
        .groups
        .iter()
        .filter(|g| g.error.is_some())
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "Failures:");
        for group in failed {
            let _ = writeln!(
                out,
                "  {:03}: {}",
                group.group_index + 1,
                group.error.as_deref().unwrap_or_default()
            );
        }
    }
    let _ = writeln!(out, "Output: {}", ctx.root.display());
    out
}

/// Cut `text` to `width` characters, marking the cut with `...`.
fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
