//! Run directory lock.
//!
//! A run directory is owned by at most one process at a time. The owner
//! holds `run.lock`, created with **create_new** semantics (exclusive
//! create) so a second `resume` of the same directory fails fast instead of
//! racing the first one over `state.json`.
//!
//! The lock file holds JSON [`LockMetadata`] so the error message can say
//! who holds it. A [`RunLock`] removes the file when dropped; a crashed
//! process leaves it behind, and `resume --force-unlock` clears it.

mod guard;
mod metadata;
mod operations;


pub use guard::RunLock;
pub use metadata::{LockAction, LockMetadata, owner_string};
pub use operations::{acquire_run_lock, clear_run_lock, read_run_lock};
