//! Run directory resolution for batchgen.
//!
//! Every file a run produces lives under one directory,
//! `{base_dir}/{slug(name)}_{YYYYMMDD_HHMMSS}/`. This module owns that
//! layout so commands, the engine, and the state store agree on paths.

use crate::error::{GenError, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Versioned plan written at plan time.
pub const PLAN_FILE: &str = "plan.json";

/// Versioned run state, rewritten after every group transition.
pub const STATE_FILE: &str = "state.json";

/// Final manifest written when a run (or resume) finishes.
pub const RESULTS_FILE: &str = "results.json";

/// Spreadsheet-friendly rendering of the manifest, one row per group.
pub const RESULTS_CSV_FILE: &str = "results.csv";

/// Append-only NDJSON event log.
pub const LOG_FILE: &str = "generation_log.ndjson";

/// Exclusive lock held while a process owns the run.
pub const LOCK_FILE: &str = "run.lock";

/// Per-group result document inside each group directory.
pub const GROUP_RESULT_FILE: &str = "result.json";

/// Text artifact inside each group directory.
pub const TEXT_FILE: &str = "text.txt";

/// Resolved paths of one run directory. All paths are absolute or relative
/// to the process working directory, exactly as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub root: PathBuf,
}

impl RunContext {
    /// Wrap an existing directory without checking it.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Directory name for a run of `name` started at `at`.
    pub fn run_id_for(name: &str, at: DateTime<Local>) -> String {
        format!("{}_{}", slugify(name), at.format("%Y%m%d_%H%M%S"))
    }

    /// Create a fresh run directory under `base_dir`.
    ///
    /// If the timestamped name is taken, `_2`, `_3`, ... are appended.
    pub fn create(base_dir: &Path, name: &str, at: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(base_dir).map_err(|e| {
            GenError::Persistence(format!(
                "failed to create output directory '{}': {}",
                base_dir.display(),
                e
            ))
        })?;

        let run_id = Self::run_id_for(name, at);
        let mut suffix = 1;
        loop {
            let dir_name = if suffix == 1 {
                run_id.clone()
            } else {
                format!("{}_{}", run_id, suffix)
            };
            let root = base_dir.join(&dir_name);
            match fs::create_dir(&root) {
                Ok(()) => return Ok(Self { root }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => {
                    return Err(GenError::Persistence(format!(
                        "failed to create run directory '{}': {}",
                        root.display(),
                        e
                    )));
                }
            }
        }
    }

    /// Open an existing run directory for resume or status.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(GenError::User(format!(
                "run directory '{}' does not exist",
                root.display()
            )));
        }
        let ctx = Self { root };
        if !ctx.plan_path().is_file() {
            return Err(GenError::User(format!(
                "'{}' is not a run directory (no {})",
                ctx.root.display(),
                PLAN_FILE
            )));
        }
        Ok(ctx)
    }

    /// The run id is the directory name.
    pub fn run_id(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join(PLAN_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    pub fn results_csv_path(&self) -> PathBuf {
        self.root.join(RESULTS_CSV_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Zero-padded group directory (`001` for group index 0).
    pub fn group_dir(&self, group_index: usize) -> PathBuf {
        self.root.join(format!("{:03}", group_index + 1))
    }

    /// Image artifact path (`001/01.png` for the first image of group 0).
    pub fn image_path(&self, group_index: usize, image_index: usize, format: &str) -> PathBuf {
        self.group_dir(group_index)
            .join(format!("{:02}.{}", image_index + 1, format))
    }

    pub fn text_path(&self, group_index: usize) -> PathBuf {
        self.group_dir(group_index).join(TEXT_FILE)
    }

    pub fn group_result_path(&self, group_index: usize) -> PathBuf {
        self.group_dir(group_index).join(GROUP_RESULT_FILE)
    }

    /// Express `path` relative to the run root when it lives inside it.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Lowercased alphanumerics (any script); every other run of characters,
/// path separators included, becomes `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "run".to_string()
    } else {
        slug.to_string()
    }
}
