//! Contents of `run.lock`.

use crate::error::{GenError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Command that owns a run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Run,
    Resume,
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockAction::Run => "run",
            LockAction::Resume => "resume",
        })
    }
}

/// Who holds a run directory, and since when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    pub run_id: String,
    pub action: LockAction,
    /// `user@HOST`
    pub owner: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockMetadata {
    pub fn for_current_process(run_id: &str, action: LockAction) -> Self {
        Self {
            run_id: run_id.to_string(),
            action,
            owner: owner_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GenError::Lock(format!("cannot read '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            GenError::Lock(format!("'{}' is not a run lock: {}", path.display(), e))
        })
    }

    /// Time since the lock was taken, e.g. `3h 12m`.
    pub fn held_for(&self) -> String {
        format_age(Utc::now().signed_duration_since(self.acquired_at).num_seconds())
    }
}

impl fmt::Display for LockMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "held by {} (pid {}) for {}: {}",
            self.owner,
            self.pid,
            self.held_for(),
            self.action
        )
    }
}

/// Render a non-negative number of seconds with its two largest units.
pub(crate) fn format_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (days, hours, minutes) = (seconds / 86_400, seconds / 3600 % 24, seconds / 60 % 60);
    match (days, hours) {
        (0, 0) if minutes == 0 => format!("{}s", seconds),
        (0, 0) => format!("{}m", minutes),
        (0, _) => format!("{}h {}m", hours, minutes),
        _ => format!("{}d {}h", days, hours),
    }
}

/// `user@HOST` of the current process, used in lock files and the event log.
pub fn owner_string() -> String {
    let user = ["USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "unknown".to_string());
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", user, host)
}
