//! Shared tail of `run` and `resume`: execute, write the manifest, report.

use super::report::format_run_summary;
use crate::context::RunContext;
use crate::engine::{Engine, ExecutionSummary};
use crate::error::{GenError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::plan::Plan;
use crate::services::Services;
use crate::state::{ResultsManifest, StateStore, write_results};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// What a `run` or `resume` invocation achieved.
#[derive(Debug)]
pub struct RunReport {
    pub ctx: RunContext,
    pub summary: ExecutionSummary,
    pub manifest: ResultsManifest,
}

impl RunReport {
    /// Map the run outcome onto the command result.
    ///
    /// An interrupt wins over group failures; both point at `resume`.
    pub fn into_result(self) -> Result<()> {
        let resume_hint = format!("resume with `batchgen resume {}`", self.ctx.root.display());
        if self.summary.cancelled {
            return Err(GenError::Cancelled(format!(
                "{} group(s) not started; {}",
                self.summary.not_started, resume_hint
            )));
        }
        let counts = &self.manifest.counts;
        if counts.failed > 0 {
            return Err(GenError::Service(format!(
                "{} of {} group(s) failed; {} to retry them",
                counts.failed, self.manifest.total_groups, resume_hint
            )));
        }
        Ok(())
    }
}

/// Execute `indices`, then persist `results.json` and close out the log.
pub fn execute_groups(
    ctx: &RunContext,
    plan: &Plan,
    store: &StateStore,
    events: &EventLog,
    services: &Services,
    cancel: Arc<AtomicBool>,
    indices: &[usize],
) -> Result<RunReport> {
    let engine = Engine::new(ctx, plan, store, events, services, cancel)?;
    let summary = engine.execute(indices)?;

    let state = store.snapshot()?;
    let manifest = write_results(ctx, &state)?;

    let details = json!({
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "not_started": summary.not_started,
        "images": manifest.total_images,
    });
    if summary.cancelled {
        tracing::warn!(not_started = summary.not_started, "run interrupted");
        events.record(Event::new(EventAction::Cancelled).with_details(details));
    } else {
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run finished"
        );
        events.record(Event::new(EventAction::RunComplete).with_details(details));
    }

    print!("{}", format_run_summary(ctx, &summary, &manifest));
    Ok(RunReport {
        ctx: ctx.clone(),
        summary,
        manifest,
    })
}
