//! Atomic file writes and post-write verification.
//!
//! Each artifact goes to `<path>.canon.tmp` first and is renamed over the
//! final path (atomic on POSIX). The engine decides *whether* to write; this
//! module never skips.

use std::path::{Path, PathBuf};

use crate::error::{unwritable, DeployError};

const PROBE_FILE: &str = ".canon-write-probe";

/// Create `dir` if needed and prove it accepts new files.
pub(crate) fn ensure_writable(dir: &Path) -> Result<(), DeployError> {
    std::fs::create_dir_all(dir).map_err(|e| unwritable(dir, e))?;
    let probe = dir.join(PROBE_FILE);
    std::fs::write(&probe, b"").map_err(|e| unwritable(dir, e))?;
    std::fs::remove_file(&probe).map_err(|e| unwritable(&probe, e))?;
    Ok(())
}

/// Write `content` to `path` through a temporary sibling.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), DeployError> {
    let tmp = PathBuf::from(format!("{}.canon.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<(), DeployError> {
    std::fs::write(tmp, content).map_err(|e| unwritable(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(unwritable(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(())
}

/// Check that every written file exists as a regular file and can be read.
pub(crate) fn verify_written(paths: &[PathBuf]) -> Result<(), DeployError> {
    for path in paths {
        let failed = |reason: String| DeployError::WriteVerificationFailed {
            path: path.clone(),
            reason,
        };
        let meta = std::fs::metadata(path).map_err(|e| failed(e.to_string()))?;
        if !meta.is_file() {
            return Err(failed("not a regular file".to_string()));
        }
        std::fs::read(path).map_err(|e| failed(e.to_string()))?;
    }
    Ok(())
}
