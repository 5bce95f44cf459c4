//! Implementation of the `batchgen status` command.
//!
//! Reads the run directory only; never takes the lock, so it can be used
//! while a run is in progress.

use crate::cli::StatusArgs;
use crate::context::RunContext;
use crate::error::Result;
use crate::locks::{LockMetadata, read_run_lock};
use crate::plan::Plan;
use crate::state::{RunState, load_state, read_plan};
use std::fmt::Write as _;

/// Execute the `batchgen status` command.
pub fn cmd_status(args: StatusArgs) -> Result<()> {
    let ctx = RunContext::open(&args.run_dir)?;
    let plan = read_plan(&ctx)?;
    let state = load_state(&ctx.state_path())?;
    let lock = read_run_lock(&ctx)?;

    print!("{}", format_status(&ctx, &plan, state.as_ref(), lock.as_ref()));
    Ok(())
}

pub(crate) fn format_status(
    ctx: &RunContext,
    plan: &Plan,
    state: Option<&RunState>,
    lock: Option<&LockMetadata>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run Status");
    let _ = writeln!(out, "==========");
    let _ = writeln!(out);
    let _ = writeln!(out, "Run:       {}", plan.run_id);
    let _ = writeln!(out, "Template:  {} ({})", plan.template.name, plan.template.mode);
    let _ = writeln!(out, "Directory: {}", ctx.root.display());
    let _ = writeln!(
        out,
        "Lock:      {}",
        lock.map(|l| l.to_string()).unwrap_or_else(|| "none".to_string())
    );
    let _ = writeln!(out);

    let Some(state) = state else {
        let _ = writeln!(out, "No state recorded yet ({} group(s) planned).", plan.total_groups());
        return out;
    };

    let counts = state.counts();
    let _ = writeln!(out, "Groups:");
    for (label, count) in [
        ("pending", counts.pending),
        ("running", counts.running),
        ("succeeded", counts.succeeded),
        ("failed", counts.failed),
    ] {
        let _ = writeln!(out, "  {:10} {:>4}", label, count);
    }
    let _ = writeln!(out, "  ----------");
    let _ = writeln!(out, "  {:10} {:>4}", "total", state.total_groups);
    let _ = writeln!(
        out,
        "Images:    {} of {} planned",
        state.produced_images(),
        plan.total_images()
    );
    let _ = writeln!(out, "Updated:   {}", state.updated_at.to_rfc3339());

    let failed: Vec<_> = state.failed().collect();
    if !failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed groups:");
        for group in failed {
            let _ = writeln!(
                out,
                "  {:03} (attempt {}): {}",
                group.group_index + 1,
                group.attempts,
                group.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if lock.is_none() && (!state.is_complete() || counts.failed > 0) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Next: batchgen resume {}", ctx.root.display());
    }
    out
}
