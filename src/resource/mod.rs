//! Resource pools: discovery of source images and selection primitives.
//!
//! A pool is built once per run and never changes afterwards. Selection
//! state (sequential cursors, coverage) lives in [`GroupSelector`] so the
//! planner owns every mutable cursor.

mod pool;
mod selection;


pub use pool::{IMAGE_EXTENSIONS, ResourcePool, natural_cmp};
pub use selection::{
    GroupSelector, SelectionRule, SequentialCursor, covered_groups, select_random,
};
