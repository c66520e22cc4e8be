//! Shared entrypoints used by the CLI and the JSON request handler.
//!
//! Each operation renders the template set, opens the project's history
//! database and drives a [`Reconciler`]. The `_at` forms take the clock
//! reading explicitly.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use canon_core::{Config, DeployedFileRecord, Deployment, ManagedDir};
use canon_templates::TemplateSet;

use crate::diff::{diff_artifacts, FileDiff};
use crate::error::DeployError;
use crate::history::{HistoryStore, SqliteHistory};
use crate::reconcile::{Assessment, Outcome, ReconcileOptions, Reconciler};
use crate::request::{DeployRequest, HistoryRequest, Request, Response};

/// Result of a deploy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "snake_case")]
pub enum DeployReport {
    /// `dry_run`: what would happen, nothing written.
    Planned(Assessment),
    Applied(Outcome),
}

/// One row of a history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub deployment: Deployment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<DeployedFileRecord>>,
}

/// Open the project's history database without creating it.
///
/// A project that was never deployed gets an empty in-memory store, so
/// read-only operations leave no `.canon/` directory behind.
fn open_history_for_read(target: &ManagedDir) -> Result<SqliteHistory, DeployError> {
    let db = target.history_db_path();
    if db.is_file() {
        SqliteHistory::open(&db)
    } else {
        tracing::debug!("no history at {}; using empty store", db.display());
        SqliteHistory::open_in_memory()
    }
}

/// Render, reconcile and record. See [`deploy_at`].
pub fn deploy(
    request: &DeployRequest,
    templates_dir: Option<&Path>,
) -> Result<DeployReport, DeployError> {
    deploy_at(request, templates_dir, Utc::now())
}

pub fn deploy_at(
    request: &DeployRequest,
    templates_dir: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<DeployReport, DeployError> {
    let request = request.clone().validated()?;
    let target = ManagedDir::resolve(&request.path);
    let set = TemplateSet::load(templates_dir)?;
    let artifacts = set.render(now)?;

    if request.dry_run {
        let mut history = open_history_for_read(&target)?;
        let reconciler = Reconciler::new(&mut history, target);
        return Ok(DeployReport::Planned(
            reconciler.plan(&artifacts, request.force_update)?,
        ));
    }

    let mut history = SqliteHistory::open(&target.history_db_path())?;
    let opts = ReconcileOptions {
        force_update: request.force_update,
        backup: request.backup,
        deployed_by: request.deployed_by.clone(),
        template_version: set.version(),
        now,
    };
    let outcome = Reconciler::new(&mut history, target).reconcile(&artifacts, &opts)?;
    Ok(DeployReport::Applied(outcome))
}

/// Read-only assessment of a project. See [`status_at`].
pub fn status(path: &Path, templates_dir: Option<&Path>) -> Result<Assessment, DeployError> {
    status_at(path, templates_dir, Utc::now())
}

pub fn status_at(
    path: &Path,
    templates_dir: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<Assessment, DeployError> {
    let target = ManagedDir::resolve(path);
    let artifacts = TemplateSet::load(templates_dir)?.render(now)?;
    let mut history = open_history_for_read(&target)?;
    Reconciler::new(&mut history, target).plan(&artifacts, false)
}

/// Unified diffs between disk and a fresh render. See [`diff_at`].
pub fn diff(path: &Path, templates_dir: Option<&Path>) -> Result<Vec<FileDiff>, DeployError> {
    diff_at(path, templates_dir, Utc::now())
}

/// Renders at `now`, like [`status_at`], so every file listed as outdated
/// there has a diff here.
pub fn diff_at(
    path: &Path,
    templates_dir: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<Vec<FileDiff>, DeployError> {
    let target = ManagedDir::resolve(path);
    let artifacts = TemplateSet::load(templates_dir)?.render(now)?;
    diff_artifacts(&target.rules_dir, &artifacts)
}

/// Newest-first deployment listing, optionally with per-file records.
pub fn history(request: &HistoryRequest) -> Result<Vec<HistoryEntry>, DeployError> {
    let request = request.clone().validated()?;
    let target = ManagedDir::resolve(&request.path);
    let store = open_history_for_read(&target)?;

    store
        .history(request.limit)?
        .into_iter()
        .map(|deployment| -> Result<HistoryEntry, DeployError> {
            let files = if request.files {
                Some(store.files_of_deployment(deployment.id)?)
            } else {
                None
            };
            Ok(HistoryEntry { deployment, files })
        })
        .collect()
}

/// Execute one typed request and wrap the result in a [`Response`].
///
/// `config` supplies the templates directory and the same deploy defaults
/// `canon deploy` applies.
pub fn handle(request: Request, config: &Config) -> Response {
    let templates_dir = config.templates_dir.as_deref();
    let result = match request {
        Request::Deploy(req) => deploy(&req.with_defaults(config), templates_dir).and_then(to_value),
        Request::Status(req) => status(&req.path, templates_dir).and_then(to_value),
        Request::Diff(req) => diff(&req.path, templates_dir).and_then(to_value),
        Request::History(req) => history(&req).and_then(to_value),
    };
    match result {
        Ok(data) => Response::ok(data),
        Err(err) => Response::error(err.to_string()),
    }
}

/// Parse, validate and execute a raw JSON request.
pub fn handle_json(raw: &str, config: &Config) -> Response {
    match Request::from_json(raw) {
        Ok(request) => handle(request, config),
        Err(err) => Response::error(err.to_string()),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value, DeployError> {
    serde_json::to_value(value).map_err(|e| DeployError::InvalidRequest(e.to_string()))
}
