//! State store: the single writer of `state.json`.
//!
//! Workers share one [`StateStore`]. Every transition takes the mutex,
//! updates the in-memory state, and rewrites the file atomically before the
//! lock is released, so concurrent completions are linearized and a crash
//! never leaves a half-written state behind.

use super::types::{GroupResult, GroupStatus, RunState, STATE_VERSION};
use crate::error::{GenError, Result};
use crate::fs::atomic_write_json;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// What [`StateStore::append_result`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Recorded,
    /// The group already had this terminal status.
    Unchanged,
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: Mutex<RunState>,
}

/// Read `state.json`; `Ok(None)` when the file does not exist.
pub fn load_state(path: &Path) -> Result<Option<RunState>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(GenError::Persistence(format!(
                "failed to read '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let state: RunState = serde_json::from_str(&content).map_err(|e| {
        GenError::Persistence(format!("failed to parse '{}': {}", path.display(), e))
    })?;
    if state.version != STATE_VERSION {
        return Err(GenError::Persistence(format!(
            "'{}' has version {}, expected {}",
            path.display(),
            state.version,
            STATE_VERSION
        )));
    }
    if state.groups.len() != state.total_groups
        || state.groups.iter().enumerate().any(|(i, g)| g.group_index != i)
    {
        return Err(GenError::Persistence(format!(
            "'{}' does not hold one result per group in index order",
            path.display()
        )));
    }
    Ok(Some(state))
}

impl StateStore {
    /// Persist `state` as the initial state of a new run.
    pub fn create<P: Into<PathBuf>>(path: P, state: RunState) -> Result<Self> {
        let path = path.into();
        atomic_write_json(&path, &state)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Open the state of an existing run.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let state = load_state(&path)?.ok_or_else(|| {
            GenError::Persistence(format!("no run state at '{}'", path.display()))
        })?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> Result<RunState> {
        Ok(self.lock()?.clone())
    }

    /// Move a pending group to `running` and count the attempt.
    pub fn mark_running(&self, group_index: usize) -> Result<()> {
        let mut state = self.lock()?;
        let group = group_mut(&mut state, group_index)?;
        if group.status != GroupStatus::Pending {
            return Err(GenError::Persistence(format!(
                "group {} cannot start from status '{}'",
                group_index + 1,
                group.status
            )));
        }
        group.status = GroupStatus::Running;
        group.attempts += 1;
        group.started_at = Some(Utc::now());
        group.error = None;
        self.persist(&mut state)
    }

    /// Record a terminal result for its group.
    ///
    /// Re-recording the status a group already has is a no-op; replacing one
    /// terminal status with another is an error.
    pub fn append_result(&self, result: GroupResult) -> Result<AppendOutcome> {
        if !result.status.is_terminal() {
            return Err(GenError::Persistence(format!(
                "group {}: '{}' is not a terminal status",
                result.group_index + 1,
                result.status
            )));
        }

        let mut state = self.lock()?;
        let group = group_mut(&mut state, result.group_index)?;
        if group.status == result.status {
            return Ok(AppendOutcome::Unchanged);
        }
        if group.status.is_terminal() {
            return Err(GenError::Persistence(format!(
                "group {} is already {}",
                result.group_index + 1,
                group.status
            )));
        }

        let attempts = group.attempts;
        let started_at = group.started_at;
        *group = GroupResult {
            attempts,
            started_at,
            ..result
        };
        self.persist(&mut state)?;
        Ok(AppendOutcome::Recorded)
    }

    /// Return every group that is not `succeeded` to `pending` for a resume.
    ///
    /// Returns the reopened indices in order. Succeeded groups are untouched.
    pub fn reopen_for_resume(&self) -> Result<Vec<usize>> {
        let mut state = self.lock()?;
        let mut reopened = Vec::new();
        for group in state.groups.iter_mut() {
            if group.status != GroupStatus::Succeeded {
                if group.status != GroupStatus::Pending {
                    tracing::debug!(
                        group = group.group_index + 1,
                        status = %group.status,
                        "reopening group"
                    );
                }
                group.status = GroupStatus::Pending;
                group.finished_at = None;
                reopened.push(group.group_index);
            }
        }
        self.persist(&mut state)?;
        Ok(reopened)
    }

    fn lock(&self) -> Result<MutexGuard<'_, RunState>> {
        self.state
            .lock()
            .map_err(|_| GenError::Persistence("run state lock poisoned".to_string()))
    }

    fn persist(&self, state: &mut RunState) -> Result<()> {
        state.updated_at = Utc::now();
        atomic_write_json(&self.path, &*state)
    }
}

fn group_mut(state: &mut RunState, group_index: usize) -> Result<&mut GroupResult> {
    let total = state.total_groups;
    state.groups.get_mut(group_index).ok_or_else(|| {
        GenError::Persistence(format!(
            "group {} is outside the plan of {} group(s)",
            group_index + 1,
            total
        ))
    })
}
