//! Canon core library: content hashing, domain types, target resolution, config.
//!
//! Public API surface:
//! - [`hash`]: SHA-256 content digests
//! - [`types`]: newtypes and deployment records
//! - [`target`]: managed-directory layout
//! - [`config`]: `~/.canon/config.yaml` load / save
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod hash;
pub mod target;
pub mod types;

pub use config::Config;
pub use error::ConfigError;
pub use hash::content_hash;
pub use target::ManagedDir;
pub use types::{
    ContentHash, DeployedFileRecord, Deployment, DeploymentId, ManagedFile, TemplateArtifact,
};
