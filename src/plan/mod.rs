//! Group planning.
//!
//! The planner produces the complete, ordered list of [`GroupSpec`]s before
//! execution starts, so a dry run can show the whole plan without any
//! network calls and a resumed run can execute exactly what was planned.

mod planner;
mod reference;
mod types;

#[cfg(test)]
mod tests;

pub use planner::{PlanInputs, PlannedGroups, Planner, build_plan};
pub use reference::ReferencePicker;
pub use types::{GroupSpec, PLAN_VERSION, Plan, PlannerCursors, ReferenceCursor};
