//! Write-temp, fsync, rename.
//!
//! The temporary file is a hidden sibling of the target
//! (`.{name}.{pid}-{n}.tmp`), so the rename never crosses a filesystem.
//! `n` is a per-process counter: two threads writing the same target never
//! share a temporary file. A crash can leave a `.tmp` sibling behind; it is
//! never read back.

use crate::error::{GenError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// Replace `path` with `content`, creating missing parent directories.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| io_error("create directory", dir, e))?;

    let temp = TempFile::next_to(path)?;
    let mut file = File::create(&temp.0).map_err(|e| io_error("create", &temp.0, e))?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| io_error("write", &temp.0, e))?;
    drop(file);

    temp.persist(path, dir)
}

pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Pretty JSON with a trailing newline.
pub fn atomic_write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| {
        GenError::Persistence(format!("cannot encode '{}': {}", path.display(), e))
    })?;
    bytes.push(b'\n');
    atomic_write(path, &bytes)
}

fn io_error(op: &str, path: &Path, e: std::io::Error) -> GenError {
    GenError::Persistence(format!("cannot {} '{}': {}", op, path.display(), e))
}

/// A temporary file that is deleted unless it was renamed into place.
struct TempFile(PathBuf);

impl TempFile {
    fn next_to(target: &Path) -> Result<Self> {
        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                GenError::Persistence(format!("'{}' has no file name", target.display()))
            })?;
        let n = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
        Ok(Self(target.with_file_name(format!(
            ".{}.{}-{}.tmp",
            name,
            std::process::id(),
            n
        ))))
    }

    fn persist(self, target: &Path, dir: &Path) -> Result<()> {
        fs::rename(&self.0, target).map_err(|e| io_error("replace", target, e))?;
        std::mem::forget(self);

        // The rename itself is durable only once the directory is synced.
        #[cfg(unix)]
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
        #[cfg(not(unix))]
        let _ = dir;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}
