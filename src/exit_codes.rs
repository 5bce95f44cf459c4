//! Exit code constants for the batchgen CLI.
//!
//! - 0: Success (every planned group succeeded, or a dry-run passed)
//! - 1: Configuration, template, or resource problem detected before execution
//! - 2: The run finished but at least one group failed
//! - 3: Run state could not be persisted or loaded
//! - 4: The run directory is locked by another process
//! - 130: The run was interrupted; unfinished groups stay pending for resume

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Bad template, config, prompt rendering, or missing source resources.
pub const USER_ERROR: i32 = 1;

/// The run completed with one or more failed groups.
pub const GROUP_FAILURES: i32 = 2;

/// State store failure (write, load, or version mismatch).
pub const PERSISTENCE_FAILURE: i32 = 3;

/// Run lock acquisition failure.
pub const LOCK_FAILURE: i32 = 4;

/// Interrupted by the user (matches the shell convention for SIGINT).
pub const CANCELLED: i32 = 130;
