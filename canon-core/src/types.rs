//! Domain types for rule deployment.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Persisted types serialize via serde so the CLI can emit them as JSON.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::content_hash;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 digest of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ContentHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentHash {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Monotonic identifier assigned by the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(pub i64);

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Transient artifacts
// ---------------------------------------------------------------------------

/// One rendered rule document, ready to be written into the managed directory.
///
/// Never persisted; only its hash ends up in the history store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateArtifact {
    pub filename: String,
    pub content: String,
}

impl TemplateArtifact {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn hash(&self) -> ContentHash {
        content_hash(&self.content)
    }
}

/// A managed file as found on disk during inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub filename: String,
    pub content_hash: ContentHash,
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// One successful write of the full rule set. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub template_version: String,
    pub deployed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
    pub file_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

/// Hash of one file written by a [`Deployment`]. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedFileRecord {
    pub id: i64,
    pub deployment_id: DeploymentId,
    pub filename: String,
    pub content_hash: ContentHash,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
