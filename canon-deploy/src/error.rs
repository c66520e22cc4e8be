//! Error types for canon-deploy.

use std::path::PathBuf;

use thiserror::Error;

use canon_core::DeploymentId;
use canon_templates::RenderError;

/// Faults of the history database itself.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    #[error("corrupt history row: {0}")]
    Corrupt(String),
}

/// All errors that can abort a reconciliation.
///
/// A drift warning is not an error; it is [`crate::Outcome::DriftWarning`].
#[derive(Debug, Error)]
pub enum DeployError {
    /// History store cannot be opened, read, or written.
    #[error("history store unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// A file record referenced a deployment that does not exist.
    #[error("deployment {0} does not exist")]
    InvalidReference(DeploymentId),

    /// The managed directory cannot be created or written.
    #[error("target {path} is not writable: {source}")]
    TargetUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested backup could not be completed; nothing was overwritten.
    #[error("backup failed at {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file expected after writing is missing or unreadable.
    #[error("written file {path} failed verification: {reason}")]
    WriteVerificationFailed { path: PathBuf, reason: String },

    /// Template rendering failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A request was rejected before reaching the engine.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An I/O error outside the write path, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<rusqlite::Error> for DeployError {
    fn from(err: rusqlite::Error) -> Self {
        DeployError::StorageUnavailable(StorageError::Sqlite(err))
    }
}

/// Convenience constructor for [`DeployError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`DeployError::TargetUnwritable`].
pub(crate) fn unwritable(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::TargetUnwritable {
        path: path.into(),
        source,
    }
}
