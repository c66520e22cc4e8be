//! Typed requests accepted at the tool boundary.
//!
//! Raw JSON arguments are deserialised into one struct per operation and
//! validated before anything touches the disk. Unknown fields are rejected.
//!
//! ```json
//! {"op": "deploy", "args": {"path": "/work/app", "force_update": true}}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use canon_core::Config;

use crate::error::DeployError;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Arguments of a deploy operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployRequest {
    /// Project root, or the managed directory itself.
    pub path: PathBuf,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default = "default_true")]
    pub backup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
    /// Assess only; never write.
    #[serde(default)]
    pub dry_run: bool,
}

impl DeployRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            force_update: false,
            backup: true,
            deployed_by: None,
            dry_run: false,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, DeployError> {
        let request: Self = serde_json::from_str(raw).map_err(invalid)?;
        request.validated()
    }

    /// Fill in the user's configured defaults: a missing actor comes from
    /// `config.deployed_by`, and `config.backup = false` turns backups off.
    pub fn with_defaults(mut self, config: &Config) -> Self {
        if self.deployed_by.is_none() {
            self.deployed_by = config.deployed_by.clone();
        }
        self.backup &= config.backup;
        self
    }

    /// Reject empty paths and blank actors; trim the actor name.
    pub fn validated(mut self) -> Result<Self, DeployError> {
        check_path(&self.path)?;
        if let Some(actor) = self.deployed_by.take() {
            let actor = actor.trim();
            if actor.is_empty() {
                return Err(DeployError::InvalidRequest(
                    "deployed_by must not be blank".to_string(),
                ));
            }
            self.deployed_by = Some(actor.to_string());
        }
        Ok(self)
    }
}

/// Arguments of operations that only need a target path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetRequest {
    pub path: PathBuf,
}

impl TargetRequest {
    pub fn validated(self) -> Result<Self, DeployError> {
        check_path(&self.path)?;
        Ok(self)
    }
}

/// Arguments of a history query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryRequest {
    pub path: PathBuf,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Include the per-file records of each deployment.
    #[serde(default)]
    pub files: bool,
}

impl HistoryRequest {
    pub fn validated(self) -> Result<Self, DeployError> {
        check_path(&self.path)?;
        if self.limit == 0 {
            return Err(DeployError::InvalidRequest(
                "limit must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// One operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Request {
    Deploy(DeployRequest),
    Status(TargetRequest),
    Diff(TargetRequest),
    History(HistoryRequest),
}

impl Request {
    /// Parse and validate a JSON request document.
    pub fn from_json(raw: &str) -> Result<Self, DeployError> {
        let request: Self = serde_json::from_str(raw).map_err(invalid)?;
        request.validated()
    }

    pub fn validated(self) -> Result<Self, DeployError> {
        Ok(match self {
            Self::Deploy(req) => Self::Deploy(req.validated()?),
            Self::Status(req) => Self::Status(req.validated()?),
            Self::Diff(req) => Self::Diff(req.validated()?),
            Self::History(req) => Self::History(req.validated()?),
        })
    }
}

/// JSON response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn check_path(path: &std::path::Path) -> Result<(), DeployError> {
    if path.as_os_str().is_empty() {
        return Err(DeployError::InvalidRequest(
            "path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn invalid(err: serde_json::Error) -> DeployError {
    DeployError::InvalidRequest(err.to_string())
}
