//! Taking, inspecting, and clearing the run lock.

use super::guard::RunLock;
use super::metadata::{LockAction, LockMetadata};
use crate::context::RunContext;
use crate::error::{GenError, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};

/// Take ownership of the run directory in `ctx` for `action`.
///
/// `run.lock` is created with `create_new`, so an existing lock (live or
/// left by a crash) is a `Lock` error naming its holder.
pub fn acquire_run_lock(ctx: &RunContext, action: LockAction) -> Result<RunLock> {
    let path = ctx.lock_path();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let holder = LockMetadata::read(&path)
                .map(|meta| meta.to_string())
                .unwrap_or_else(|_| "by an unreadable lock file".to_string());
            return Err(GenError::Lock(format!(
                "run {} is locked, {}\nIf that process is gone, resume with --force-unlock.",
                ctx.run_id(),
                holder
            )));
        }
        Err(e) => {
            return Err(GenError::Lock(format!(
                "cannot create '{}': {}",
                path.display(),
                e
            )));
        }
    };
    // From here the file exists; the token removes it again on any failure.
    let lock = RunLock::held_at(path);

    let metadata = LockMetadata::for_current_process(&ctx.run_id(), action);
    let json = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| GenError::Lock(format!("cannot encode lock metadata: {}", e)))?;
    file.write_all(&json)
        .and_then(|()| file.sync_all())
        .map_err(|e| GenError::Lock(format!("cannot write lock metadata: {}", e)))?;

    tracing::debug!(action = %action, "run lock acquired");
    Ok(lock)
}

/// Current holder of the run lock, if any.
pub fn read_run_lock(ctx: &RunContext) -> Result<Option<LockMetadata>> {
    let path = ctx.lock_path();
    if !path.exists() {
        return Ok(None);
    }
    LockMetadata::read(&path).map(Some)
}

/// Remove a leftover run lock, returning its metadata when readable.
pub fn clear_run_lock(ctx: &RunContext) -> Result<Option<LockMetadata>> {
    let path = ctx.lock_path();
    if !path.exists() {
        return Ok(None);
    }
    let previous = LockMetadata::read(&path).ok();
    std::fs::remove_file(&path)
        .map_err(|e| GenError::Lock(format!("cannot remove '{}': {}", path.display(), e)))?;
    tracing::warn!(path = %path.display(), "cleared run lock");
    Ok(previous)
}
