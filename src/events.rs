//! Generation log for batchgen runs.
//!
//! Every run directory carries an append-only `generation_log.ndjson`, one
//! JSON object per line, recording what happened to the run and its groups.
//! Unlike `state.json`, which only holds the latest status, the log keeps
//! the full history across resumes.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`run_start`, `group_failed`, ...)
//! - `actor`: `user@HOST` of the process that wrote the line
//! - `group`: one-based group number for group events
//! - `details`: freeform object with action-specific details

use crate::context::RunContext;
use crate::error::{GenError, Result};
use crate::locks::owner_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

/// Actions that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A new run directory was created.
    RunStart,
    /// The plan was written.
    Plan,
    GroupStart,
    GroupSucceeded,
    GroupFailed,
    /// An existing run was reopened.
    Resume,
    /// The run stopped early on user interrupt.
    Cancelled,
    /// Every scheduled group reached a terminal state.
    RunComplete,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventAction::RunStart => "run_start",
            EventAction::Plan => "plan",
            EventAction::GroupStart => "group_start",
            EventAction::GroupSucceeded => "group_succeeded",
            EventAction::GroupFailed => "group_failed",
            EventAction::Resume => "resume",
            EventAction::Cancelled => "cancelled",
            EventAction::RunComplete => "run_complete",
        };
        f.write_str(name)
    }
}

/// One line of the generation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    pub actor: String,

    /// One-based group number for group events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,

    pub details: Value,
}

impl Event {
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: owner_string(),
            group: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach a zero-based group index; it is logged one-based.
    pub fn with_group(mut self, group_index: usize) -> Self {
        self.group = Some(group_index + 1);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GenError::Persistence(format!("failed to serialize event: {}", e)))
    }
}

/// Appender for one run's log. Workers share it; appends are serialized so
/// lines never interleave.
#[derive(Debug)]
pub struct EventLog {
    ctx: RunContext,
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            ctx: ctx.clone(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn append(&self, event: &Event) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GenError::Persistence("event log lock poisoned".to_string()))?;
        append_event(&self.ctx, event)
    }

    /// Append, logging instead of failing. The log is an audit trail; losing
    /// a line must not fail a group whose state was already persisted.
    pub fn record(&self, event: Event) {
        if let Err(e) = self.append(&event) {
            tracing::warn!(action = %event.action, error = %e, "failed to append to generation log");
        }
    }
}

/// Append one event as a line to `generation_log.ndjson`, creating the file
/// if needed, and sync it to disk.
pub fn append_event(ctx: &RunContext, event: &Event) -> Result<()> {
    let log_path = ctx.log_path();
    let json_line = event.to_ndjson_line()?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| {
            GenError::Persistence(format!(
                "failed to open generation log '{}': {}",
                log_path.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        GenError::Persistence(format!(
            "failed to write to generation log '{}': {}",
            log_path.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        GenError::Persistence(format!(
            "failed to sync generation log '{}': {}",
            log_path.display(),
            e
        ))
    })
}

/// Read every event of a run's log, skipping unparseable lines.
pub fn read_events(ctx: &RunContext) -> Result<Vec<Event>> {
    let log_path = ctx.log_path();
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&log_path).map_err(|e| {
        GenError::Persistence(format!(
            "failed to read generation log '{}': {}",
            log_path.display(),
            e
        ))
    })?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
