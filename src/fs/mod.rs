//! Filesystem utilities for batchgen.
//!
//! Every durable artifact of a run (state, plan, manifest, generated images,
//! text) is written through [`atomic_write`] so that a crash mid-write never
//! corrupts a previously committed file.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_json, atomic_write_file};
