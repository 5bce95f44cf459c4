//! Command implementations for batchgen.
//!
//! `run` plans a template and executes it, `resume` picks up a run directory
//! where it stopped, and `status` reports on one. Run-level outcomes map to
//! errors so `main` can turn them into exit codes: failed groups become
//! `GenError::Service`, an interrupt becomes `GenError::Cancelled`.

mod execute;
mod report;
mod resume;
mod run;
mod status;


use crate::cli::Command;
use crate::config::ServiceConfig;
use crate::error::{GenError, Result};
use crate::services::Services;
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Dispatch a command to its implementation.
///
/// `cancel` is raised by the interrupt handler; long-running commands stop
/// taking new work once it is set.
pub fn dispatch(command: Command, cancel: Arc<AtomicBool>) -> Result<()> {
    match command {
        Command::Run(args) => run::cmd_run(args, cancel),
        Command::Resume(args) => resume::cmd_resume(args, cancel),
        Command::Status(args) => status::cmd_status(args),
    }
}

/// Load the service config and build the HTTP adapters.
fn load_services(path: &Path) -> Result<Services> {
    if !path.is_file() {
        return Err(GenError::Config(format!(
            "service config '{}' not found (use -c to point at one)",
            path.display()
        )));
    }
    let config = ServiceConfig::load(path)?;
    Services::from_config(&config)
}

/// Ask a yes/no question on the terminal. Defaults to no.
fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Err(GenError::User(format!(
            "{} (stdin is not a terminal; pass -y to proceed)",
            prompt
        )));
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| GenError::User(format!("failed to read confirmation: {}", e)))
}
