//! CLI argument parsing for batchgen.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default service config file, looked up in the working directory.
pub const DEFAULT_SERVICE_CONFIG: &str = "config.yaml";

/// Batchgen: batch AI product image generation from a task template.
///
/// A run is planned up front into groups (product images, reference image,
/// prompt per group), then executed with bounded concurrency. Every run
/// lives in its own directory and can be resumed after an interruption.
#[derive(Parser, Debug)]
#[command(name = "batchgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log filter (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for batchgen.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan a template and execute it.
    ///
    /// With `--dry-run`, validates the template and prints the plan without
    /// contacting any service or writing anything.
    Run(RunArgs),

    /// Resume an interrupted run.
    ///
    /// Re-executes every group that did not succeed, using the plan
    /// recorded in the run directory.
    Resume(ResumeArgs),

    /// Show the progress of a run.
    Status(StatusArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Task template (YAML).
    #[arg(short, long)]
    pub template: PathBuf,

    /// Service config (YAML).
    #[arg(short, long, default_value = DEFAULT_SERVICE_CONFIG)]
    pub config: PathBuf,

    /// Print the plan without executing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation when the plan carries warnings.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the `resume` command.
#[derive(Parser, Debug)]
pub struct ResumeArgs {
    /// Run directory created by `batchgen run`.
    pub run_dir: PathBuf,

    /// Service config (YAML).
    #[arg(short, long, default_value = DEFAULT_SERVICE_CONFIG)]
    pub config: PathBuf,

    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Remove a lock left behind by a process that is no longer running.
    #[arg(long)]
    pub force_unlock: bool,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Run directory created by `batchgen run`.
    pub run_dir: PathBuf,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
