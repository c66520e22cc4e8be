//! # canon-deploy
//!
//! Deployment reconciliation: decides whether to write, skip, or refuse to
//! overwrite the managed rule files, with backups and an append-only history.
//!
//! Call [`pipeline::deploy`] for the full render → reconcile → record flow, or
//! drive a [`Reconciler`] directly with a [`HistoryStore`] of your choosing.

pub mod backup;
pub mod diff;
pub mod error;
pub mod history;
pub mod inventory;
pub mod pipeline;
pub mod reconcile;
pub mod request;
mod writer;

pub use diff::{diff_artifacts, FileDiff};
pub use error::{DeployError, StorageError};
pub use history::{HistoryStore, NewDeployment, SqliteHistory};
pub use reconcile::{Assessment, Decision, Outcome, ReconcileOptions, Reconciler, WriteReason};
pub use request::{DeployRequest, HistoryRequest, Request, Response, TargetRequest};
