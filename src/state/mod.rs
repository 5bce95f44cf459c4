//! State store for batchgen runs.
//!
//! `state.json` holds one [`GroupResult`] per planned group and is rewritten
//! atomically after every transition, so after a crash the `pending` groups
//! are exactly the unfinished work. The plan itself is persisted verbatim in
//! `plan.json`; resume reads it back instead of planning again.

mod documents;
mod store;
mod types;


pub use documents::{
    GroupRecord, ResultsManifest, read_plan, write_group_record, write_plan, write_results,
};
pub use store::{AppendOutcome, StateStore, load_state};
pub use types::{GroupResult, GroupStatus, RunState, STATE_VERSION, StatusCounts, TextOutput};
