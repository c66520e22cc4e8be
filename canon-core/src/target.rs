//! Managed-directory layout.
//!
//! ```text
//! <project_root>/
//!   .canon/
//!     history.db              (deployment history, one database per project)
//!   .cursor/
//!     rules/                  (managed directory)
//!       <name>.mdc            (managed files)
//!       backups/
//!         <timestamp>/        (verbatim pre-overwrite snapshots)
//! ```

use std::path::{Path, PathBuf};

/// Two-level subpath holding the managed files, relative to the project root.
pub const RULES_SUBPATH: &str = ".cursor/rules";
/// Only files with this suffix are inventoried as managed files.
pub const MANAGED_SUFFIX: &str = ".mdc";
/// Snapshot directory inside the managed directory.
pub const BACKUPS_DIR: &str = "backups";
/// Per-project state directory.
pub const STATE_DIR: &str = ".canon";
/// History database file name inside [`STATE_DIR`].
pub const HISTORY_DB: &str = "history.db";

/// Resolved locations for one project's managed rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDir {
    pub project_root: PathBuf,
    pub rules_dir: PathBuf,
}

impl ManagedDir {
    /// Resolve from a caller-supplied base path.
    ///
    /// `base` is normally the project root; if it already ends in
    /// `.cursor/rules` it is taken as the managed directory itself.
    pub fn resolve(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        if base.ends_with(RULES_SUBPATH) {
            let project_root = base
                .parent()
                .and_then(Path::parent)
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            return Self {
                project_root,
                rules_dir: base,
            };
        }
        Self {
            rules_dir: base.join(RULES_SUBPATH),
            project_root: base,
        }
    }

    /// `<rules_dir>/backups`
    pub fn backups_dir(&self) -> PathBuf {
        self.rules_dir.join(BACKUPS_DIR)
    }

    /// `<project_root>/.canon/history.db`
    pub fn history_db_path(&self) -> PathBuf {
        self.project_root.join(STATE_DIR).join(HISTORY_DB)
    }
}

/// True for a bare file name (no separators) carrying the managed suffix.
pub fn is_managed_filename(name: &str) -> bool {
    name.len() > MANAGED_SUFFIX.len()
        && name.ends_with(MANAGED_SUFFIX)
        && !name.contains('/')
        && !name.contains('\\')
}
