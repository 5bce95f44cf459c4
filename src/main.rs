//! Batchgen: template-driven batch AI product image generation.
//!
//! This is the main entry point for the `batchgen` CLI. It parses arguments,
//! sets up logging and the interrupt handler, dispatches to the command
//! handler, and maps errors to exit codes.

mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod plan;
pub mod prompt;
pub mod resource;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(&cli.log_level);

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&cancel));

    match commands::dispatch(cli.command, cancel) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides `--log-level` when set.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// First Ctrl-C lets in-flight groups finish; a second one exits at once.
fn install_interrupt_handler(cancel: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            eprintln!("Interrupted again; exiting without waiting.");
            std::process::exit(exit_codes::CANCELLED);
        }
        eprintln!("Interrupt received; finishing running groups (Ctrl-C again to abort).");
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to install interrupt handler");
    }
}
