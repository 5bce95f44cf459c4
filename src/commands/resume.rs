//! Implementation of the `batchgen resume` command.
//!
//! Resume never re-plans: the group specs recorded in `plan.json` are
//! executed as they are. Every group that did not succeed (failed, pending,
//! or left `running` by a crash) goes back to `pending` and runs again;
//! succeeded groups are never touched.

use super::execute::{RunReport, execute_groups};
use super::{confirm, load_services};
use crate::cli::ResumeArgs;
use crate::context::RunContext;
use crate::engine::ExecutionSummary;
use crate::error::{GenError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::locks::{LockAction, acquire_run_lock, clear_run_lock};
use crate::plan::Plan;
use crate::services::Services;
use crate::state::{GroupStatus, RunState, StateStore, load_state, read_plan, write_results};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Execute the `batchgen resume` command.
pub fn cmd_resume(args: ResumeArgs, cancel: Arc<AtomicBool>) -> Result<()> {
    let ctx = RunContext::open(&args.run_dir)?;

    if args.force_unlock {
        match clear_run_lock(&ctx)? {
            Some(holder) => println!("Removed run lock ({})", holder),
            None => println!("No run lock to remove"),
        }
    }

    let services = load_services(&args.config)?;
    resume_run(&ctx, &services, args.yes, cancel)?.into_result()
}

/// Re-execute every unfinished group of the run in `ctx`.
pub(crate) fn resume_run(
    ctx: &RunContext,
    services: &Services,
    yes: bool,
    cancel: Arc<AtomicBool>,
) -> Result<RunReport> {
    let lock = acquire_run_lock(ctx, LockAction::Resume)?;
    let plan = read_plan(ctx)?;
    services.check_for(
        plan.template.generation_target,
        plan.template.text_generation.enabled,
    )?;
    let store = open_store(ctx, &plan)?;

    let state = store.snapshot()?;
    let unfinished = state
        .groups
        .iter()
        .filter(|g| g.status != GroupStatus::Succeeded)
        .count();

    if unfinished == 0 {
        println!(
            "All {} group(s) of {} already succeeded; nothing to resume.",
            state.total_groups, state.run_id
        );
        let manifest = write_results(ctx, &state)?;
        lock.release()?;
        return Ok(RunReport {
            ctx: ctx.clone(),
            summary: ExecutionSummary::default(),
            manifest,
        });
    }

    let counts = state.counts();
    println!(
        "Resuming {}: {} of {} group(s) to run ({} failed, {} pending)",
        state.run_id,
        unfinished,
        state.total_groups,
        counts.failed,
        counts.pending + counts.running
    );
    if !yes && !confirm("Resume these groups?")? {
        return Err(GenError::User("aborted: resume not confirmed".to_string()));
    }

    let reopened = store.reopen_for_resume()?;
    let events = EventLog::new(ctx);
    events.record(Event::new(EventAction::Resume).with_details(json!({
        "groups": reopened.len(),
        "previously_failed": counts.failed,
    })));
    tracing::info!(groups = reopened.len(), "resuming run");

    let report = execute_groups(ctx, &plan, &store, &events, services, cancel, &reopened)?;
    lock.release()?;
    Ok(report)
}

/// Open the run's state, or start it fresh if the run stopped before the
/// first state write.
fn open_store(ctx: &RunContext, plan: &Plan) -> Result<StateStore> {
    let path = ctx.state_path();
    let Some(state) = load_state(&path)? else {
        tracing::warn!("no state.json; starting every group from pending");
        return StateStore::create(path, RunState::new(plan));
    };

    if state.run_id != plan.run_id || state.total_groups != plan.total_groups() {
        return Err(GenError::Persistence(format!(
            "state.json ({}, {} groups) does not match plan.json ({}, {} groups)",
            state.run_id,
            state.total_groups,
            plan.run_id,
            plan.total_groups()
        )));
    }
    StateStore::open(path)
}
