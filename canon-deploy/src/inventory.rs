//! Inventory of managed files currently on disk.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use canon_core::{content_hash, target::is_managed_filename, ContentHash, ManagedFile};

use crate::error::{io_err, DeployError};

/// Hash every managed file directly inside `rules_dir`, sorted by filename.
///
/// A missing directory is an empty inventory. Files that cannot be read are
/// logged and left out, as if absent.
pub fn scan(rules_dir: &Path) -> Result<Vec<ManagedFile>, DeployError> {
    let entries = match std::fs::read_dir(rules_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(rules_dir, err)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(rules_dir, e))?;
        let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !is_managed_filename(&filename) {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::read(&path) {
            Ok(bytes) => files.push(ManagedFile {
                filename,
                content_hash: content_hash(bytes),
            }),
            Err(err) => {
                tracing::warn!("skipping unreadable managed file {}: {err}", path.display());
            }
        }
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}

/// `filename → hash` view of an inventory.
pub fn hash_map(files: &[ManagedFile]) -> BTreeMap<String, ContentHash> {
    files
        .iter()
        .map(|f| (f.filename.clone(), f.content_hash.clone()))
        .collect()
}
