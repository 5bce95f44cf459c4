//! Implementation of the `batchgen run` command.
//!
//! # Steps
//!
//! 1. Load and validate the template, discover pools, build the plan
//! 2. With `--dry-run`, print the plan and stop (nothing is written)
//! 3. Check that the configured services cover the generation target
//! 4. Ask for confirmation when the plan carries warnings (unless `-y`)
//! 5. Create the run directory and take its lock
//! 6. Write `plan.json` and the initial `state.json`
//! 7. Execute every group, then write `results.json`

use super::execute::{RunReport, execute_groups};
use super::report::{format_plan, format_plan_summary};
use super::{confirm, load_services};
use crate::cli::RunArgs;
use crate::config::Template;
use crate::context::RunContext;
use crate::error::{GenError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::locks::{LockAction, acquire_run_lock};
use crate::plan::{Plan, PlanInputs, build_plan};
use crate::services::Services;
use crate::state::{RunState, StateStore, write_plan};
use chrono::Local;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Execute the `batchgen run` command.
pub fn cmd_run(args: RunArgs, cancel: Arc<AtomicBool>) -> Result<()> {
    let plan = plan_template(&args.template)?;

    if args.dry_run {
        print!("{}", format_plan(&plan));
        println!();
        println!("Dry run: no service was called and nothing was written.");
        return Ok(());
    }

    let services = load_services(&args.config)?;
    run_plan(plan, &services, args.yes, cancel)?.into_result()
}

/// Load `path` and plan it under a provisional run id.
pub(crate) fn plan_template(path: &Path) -> Result<Plan> {
    let template = Template::load(path)?;
    let inputs = PlanInputs::load(&template)?;
    let run_id = RunContext::run_id_for(&template.name, Local::now());
    build_plan(&template, &inputs, run_id)
}

/// Create a run directory for `plan` and execute all of it.
pub(crate) fn run_plan(
    mut plan: Plan,
    services: &Services,
    yes: bool,
    cancel: Arc<AtomicBool>,
) -> Result<RunReport> {
    let template = &plan.template;
    services.check_for(template.generation_target, template.text_generation.enabled)?;

    print!("{}", format_plan_summary(&plan));
    if !plan.warnings.is_empty() && !yes && !confirm("The plan has warnings. Continue?")? {
        return Err(GenError::User("aborted: plan not confirmed".to_string()));
    }

    let ctx = RunContext::create(&template.output_dir(), &template.name, Local::now())?;
    plan.run_id = ctx.run_id();
    let lock = acquire_run_lock(&ctx, LockAction::Run)?;
    tracing::info!(dir = %ctx.root.display(), "run directory created");

    let events = EventLog::new(&ctx);
    events.record(Event::new(EventAction::RunStart).with_details(json!({
        "template": plan.template.name,
        "mode": plan.template.mode,
        "seed": plan.seed,
    })));

    write_plan(&ctx, &plan)?;
    let store = StateStore::create(ctx.state_path(), RunState::new(&plan))?;
    events.record(Event::new(EventAction::Plan).with_details(json!({
        "groups": plan.total_groups(),
        "images": plan.total_images(),
        "warnings": plan.warnings,
    })));

    let indices: Vec<usize> = (0..plan.total_groups()).collect();
    let report = execute_groups(&ctx, &plan, &store, &events, services, cancel, &indices)?;
    lock.release()?;
    Ok(report)
}
