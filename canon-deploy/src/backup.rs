//! Backup manager: verbatim snapshots of managed files before an overwrite.
//!
//! Snapshots live in `<rules_dir>/backups/<YYYYMMDDTHHMMSS.ffffffZ>/`. A
//! second snapshot with the same stamp gets a `-1`, `-2`, … suffix. Snapshot
//! directories are never modified after creation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use canon_core::target::BACKUPS_DIR;

use crate::error::DeployError;

/// Copy `managed_filenames` from `source_dir` into a fresh snapshot directory.
///
/// Returns `None` without touching the disk when there is nothing to copy.
/// On failure the partial snapshot stays where it is.
pub fn backup(
    source_dir: &Path,
    managed_filenames: &[String],
    now: DateTime<Utc>,
) -> Result<Option<PathBuf>, DeployError> {
    if managed_filenames.is_empty() {
        return Ok(None);
    }

    let root = source_dir.join(BACKUPS_DIR);
    std::fs::create_dir_all(&root).map_err(|e| backup_err(&root, e))?;
    let snapshot = create_unique_dir(&root, &now.format("%Y%m%dT%H%M%S%.6fZ").to_string())?;

    for name in managed_filenames {
        let from = source_dir.join(name);
        let to = snapshot.join(name);
        std::fs::copy(&from, &to).map_err(|e| backup_err(&from, e))?;
    }

    tracing::info!(
        "backed up {} file(s) to {}",
        managed_filenames.len(),
        snapshot.display()
    );
    Ok(Some(snapshot))
}

fn create_unique_dir(root: &Path, stamp: &str) -> Result<PathBuf, DeployError> {
    let mut candidate = root.join(stamp);
    let mut suffix = 0u32;
    loop {
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                suffix += 1;
                candidate = root.join(format!("{stamp}-{suffix}"));
            }
            Err(err) => return Err(backup_err(&candidate, err)),
        }
    }
}

fn backup_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::BackupFailed {
        path: path.into(),
        source,
    }
}
