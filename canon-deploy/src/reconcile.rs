//! Reconciliation engine.
//!
//! Compares three views of the managed rule files and decides what to do:
//!
//! - **current**: hashes of the `.mdc` files on disk right now
//! - **baseline**: hashes recorded by the latest deployment
//! - **desired**: hashes of the freshly rendered template set
//!
//! Decision order:
//! 1. Nothing on disk → write.
//! 2. `force_update` → write, overwriting any drift.
//! 3. No drift and nothing outdated → already up to date.
//! 4. Drift (disk differs from baseline) → refuse, report the files.
//! 5. Otherwise (disk differs from desired) → write.
//!
//! "Outdated" compares disk against desired, not baseline against desired: a
//! hand edit that already matches the new template counts as up to date for
//! that file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use canon_core::{
    target::is_managed_filename, ContentHash, Deployment, DeploymentId, ManagedDir,
    TemplateArtifact,
};

use crate::backup;
use crate::error::{DeployError, StorageError};
use crate::history::{HistoryStore, NewDeployment};
use crate::inventory;
use crate::writer;

// ---------------------------------------------------------------------------
// Inputs and results
// ---------------------------------------------------------------------------

/// Per-invocation switches for [`Reconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Overwrite even when managed files drifted since the last deployment.
    pub force_update: bool,
    /// Snapshot the current managed files before overwriting them.
    pub backup: bool,
    pub deployed_by: Option<String>,
    pub template_version: String,
    /// Render time; names the backup directory and is recorded as `deployed_at`.
    pub now: DateTime<Utc>,
}

/// Why the engine chose to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteReason {
    /// No managed files on disk.
    EmptyTarget,
    /// `force_update` was set.
    Forced,
    /// At least one file on disk differs from the rendered template.
    TemplateChanged,
}

/// What a reconciliation would do, before any side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Write(WriteReason),
    AlreadyUpToDate,
    DriftWarning,
}

/// Read-only comparison of disk, baseline and desired state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub decision: Decision,
    /// On disk and in the baseline, with different hashes.
    pub drifted: Vec<String>,
    /// Rendered files whose on-disk copy is missing or different.
    pub outdated: Vec<String>,
    /// Managed files on disk that the latest deployment did not write.
    pub untracked: Vec<String>,
    /// Files of the latest deployment no longer on disk.
    pub missing: Vec<String>,
    pub last_deployment: Option<Deployment>,
    #[serde(skip)]
    current: BTreeMap<String, ContentHash>,
}

impl Assessment {
    /// Managed filenames present on disk at assessment time.
    pub fn current_filenames(&self) -> Vec<String> {
        self.current.keys().cloned().collect()
    }
}

/// Result of [`Reconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    AlreadyUpToDate,
    DriftWarning {
        files: Vec<String>,
        last_deployment: Deployment,
    },
    Deployed {
        deployment_id: DeploymentId,
        filenames: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        backup_path: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Filenames in both `current` and `baseline` whose hashes differ.
fn drifted(
    current: &BTreeMap<String, ContentHash>,
    baseline: &BTreeMap<String, ContentHash>,
) -> Vec<String> {
    current
        .iter()
        .filter(|(name, hash)| baseline.get(*name).is_some_and(|base| base != *hash))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Desired filenames whose on-disk hash is absent or different.
fn outdated(
    current: &BTreeMap<String, ContentHash>,
    desired: &BTreeMap<String, ContentHash>,
) -> Vec<String> {
    desired
        .iter()
        .filter(|(name, hash)| current.get(*name) != Some(*hash))
        .map(|(name, _)| name.clone())
        .collect()
}

fn decide(inventory_empty: bool, force_update: bool, drifted: &[String], outdated: &[String]) -> Decision {
    if inventory_empty {
        Decision::Write(WriteReason::EmptyTarget)
    } else if force_update {
        Decision::Write(WriteReason::Forced)
    } else if drifted.is_empty() && outdated.is_empty() {
        Decision::AlreadyUpToDate
    } else if !drifted.is_empty() {
        Decision::DriftWarning
    } else {
        Decision::Write(WriteReason::TemplateChanged)
    }
}

fn validate_artifacts(artifacts: &[TemplateArtifact]) -> Result<BTreeMap<String, ContentHash>, DeployError> {
    let mut desired = BTreeMap::new();
    for artifact in artifacts {
        if !is_managed_filename(&artifact.filename) {
            return Err(DeployError::InvalidRequest(format!(
                "artifact '{}' is not a managed file name",
                artifact.filename
            )));
        }
        if desired
            .insert(artifact.filename.clone(), artifact.hash())
            .is_some()
        {
            return Err(DeployError::InvalidRequest(format!(
                "artifact '{}' appears more than once",
                artifact.filename
            )));
        }
    }
    Ok(desired)
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Drives one managed directory against one history store.
///
/// Callers serialise reconciliations per directory; the read → decide →
/// write sequence is not atomic against other writers.
pub struct Reconciler<'h, H: HistoryStore + ?Sized> {
    history: &'h mut H,
    target: ManagedDir,
}

impl<'h, H: HistoryStore + ?Sized> Reconciler<'h, H> {
    pub fn new(history: &'h mut H, target: ManagedDir) -> Self {
        Self { history, target }
    }

    /// Evaluate without touching the disk or the history store.
    pub fn plan(
        &self,
        artifacts: &[TemplateArtifact],
        force_update: bool,
    ) -> Result<Assessment, DeployError> {
        let desired = validate_artifacts(artifacts)?;
        let current = inventory::hash_map(&inventory::scan(&self.target.rules_dir)?);

        let last_deployment = self.history.latest_deployment()?;
        let baseline: BTreeMap<String, ContentHash> = match &last_deployment {
            Some(latest) => self
                .history
                .files_of_deployment(latest.id)?
                .into_iter()
                .map(|record| (record.filename, record.content_hash))
                .collect(),
            None => BTreeMap::new(),
        };

        let drifted = drifted(&current, &baseline);
        let outdated = outdated(&current, &desired);
        let decision = decide(current.is_empty(), force_update, &drifted, &outdated);

        let baseline_names: BTreeSet<&String> = baseline.keys().collect();
        let untracked = current
            .keys()
            .filter(|name| !baseline_names.contains(name))
            .cloned()
            .collect();
        let missing = baseline
            .keys()
            .filter(|name| !current.contains_key(*name))
            .cloned()
            .collect();

        Ok(Assessment {
            decision,
            drifted,
            outdated,
            untracked,
            missing,
            last_deployment,
            current,
        })
    }

    /// Reconcile the managed directory with `artifacts`.
    pub fn reconcile(
        &mut self,
        artifacts: &[TemplateArtifact],
        opts: &ReconcileOptions,
    ) -> Result<Outcome, DeployError> {
        writer::ensure_writable(&self.target.rules_dir)?;
        let assessment = self.plan(artifacts, opts.force_update)?;

        match assessment.decision {
            Decision::AlreadyUpToDate => {
                tracing::info!("{}: already up to date", self.target.rules_dir.display());
                Ok(Outcome::AlreadyUpToDate)
            }
            Decision::DriftWarning => {
                let last_deployment = assessment.last_deployment.ok_or_else(|| {
                    StorageError::Corrupt("drift reported without a recorded deployment".into())
                })?;
                tracing::warn!(
                    "{}: {} managed file(s) edited since deployment {}; not writing",
                    self.target.rules_dir.display(),
                    assessment.drifted.len(),
                    last_deployment.id,
                );
                Ok(Outcome::DriftWarning {
                    files: assessment.drifted,
                    last_deployment,
                })
            }
            Decision::Write(reason) => {
                tracing::info!("{}: writing ({reason:?})", self.target.rules_dir.display());
                self.write(artifacts, &assessment, opts)
            }
        }
    }

    fn write(
        &mut self,
        artifacts: &[TemplateArtifact],
        assessment: &Assessment,
        opts: &ReconcileOptions,
    ) -> Result<Outcome, DeployError> {
        let backup_path = if opts.backup {
            backup::backup(
                &self.target.rules_dir,
                &assessment.current_filenames(),
                opts.now,
            )?
        } else {
            None
        };

        let mut written = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let path = self.target.rules_dir.join(&artifact.filename);
            writer::atomic_write(&path, &artifact.content)?;
            written.push(path);
        }
        writer::verify_written(&written)?;

        let files: Vec<(String, ContentHash)> = artifacts
            .iter()
            .map(|a| (a.filename.clone(), a.hash()))
            .collect();
        let deployment_id = self.history.record(
            &NewDeployment {
                template_version: opts.template_version.clone(),
                deployed_at: Some(opts.now),
                deployed_by: opts.deployed_by.clone(),
                backup_path: backup_path.clone(),
            },
            &files,
        )?;
        tracing::info!(
            "recorded deployment {deployment_id} ({} file(s))",
            files.len()
        );

        Ok(Outcome::Deployed {
            deployment_id,
            filenames: artifacts.iter().map(|a| a.filename.clone()).collect(),
            backup_path,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
