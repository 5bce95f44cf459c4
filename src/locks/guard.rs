//! Ownership token for `run.lock`.

use crate::error::{GenError, Result};
use std::path::PathBuf;

/// Removes `run.lock` when dropped. A failed removal on drop is only logged;
/// call [`RunLock::release`] to see it as an error.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    held: bool,
}

impl RunLock {
    pub(super) fn held_at(path: PathBuf) -> Self {
        Self { path, held: true }
    }

    pub fn release(mut self) -> Result<()> {
        self.held = false;
        std::fs::remove_file(&self.path).map_err(|e| {
            GenError::Lock(format!("cannot remove '{}': {}", self.path.display(), e))
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if self.held
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            tracing::warn!(path = %self.path.display(), error = %e, "run lock left behind");
        }
    }
}
