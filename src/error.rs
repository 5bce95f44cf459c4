//! Error types for batchgen.
//!
//! Uses thiserror for derive macros. The variants follow the propagation
//! policy of the run: planning-time errors (`Config`, `Resource`, `Template`)
//! abort before any work starts, `Service` errors are caught per group and
//! recorded, and `Persistence` errors are fatal for the run.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for batchgen operations.
#[derive(Error, Debug)]
pub enum GenError {
    /// Malformed or contradictory template/config.
    #[error("configuration error: {0}")]
    Config(String),

    /// A source directory or prompt library is missing or empty.
    #[error("resource error: {0}")]
    Resource(String),

    /// A prompt template could not be rendered.
    #[error("template error: {0}")]
    Template(String),

    /// An external image or text service call failed or timed out.
    #[error("service error: {0}")]
    Service(String),

    /// Run state could not be written or read back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The run directory lock is held by another process.
    #[error("lock acquisition failed: {0}")]
    Lock(String),

    /// Invalid invocation (bad arguments, user declined confirmation).
    #[error("{0}")]
    User(String),

    /// The run was interrupted before every group finished.
    #[error("run interrupted: {0}")]
    Cancelled(String),
}

impl GenError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            GenError::Config(_)
            | GenError::Resource(_)
            | GenError::Template(_)
            | GenError::User(_) => exit_codes::USER_ERROR,
            GenError::Service(_) => exit_codes::GROUP_FAILURES,
            GenError::Persistence(_) => exit_codes::PERSISTENCE_FAILURE,
            GenError::Lock(_) => exit_codes::LOCK_FAILURE,
            GenError::Cancelled(_) => exit_codes::CANCELLED,
        }
    }
}

/// Result type alias for batchgen operations.
pub type Result<T> = std::result::Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_errors_map_to_user_error() {
        for err in [
            GenError::Config("bad".into()),
            GenError::Resource("empty".into()),
            GenError::Template("undefined".into()),
        ] {
            assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        }
    }

    #[test]
    fn test_persistence_error_has_correct_exit_code() {
        let err = GenError::Persistence("disk full".to_string());
        assert_eq!(err.exit_code(), exit_codes::PERSISTENCE_FAILURE);
    }

    #[test]
    fn test_lock_error_has_correct_exit_code() {
        let err = GenError::Lock("run locked".to_string());
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn test_cancelled_error_has_correct_exit_code() {
        let err = GenError::Cancelled("3 groups pending".to_string());
        assert_eq!(err.exit_code(), exit_codes::CANCELLED);
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let err = GenError::Config("group_count must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: group_count must be at least 1"
        );

        let err = GenError::User("aborted".to_string());
        assert_eq!(err.to_string(), "aborted");
    }
}
