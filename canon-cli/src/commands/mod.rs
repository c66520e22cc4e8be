pub mod config;
pub mod deploy;
pub mod diff;
pub mod history;
pub mod request;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;

use canon_core::{config as user_config, Config, Deployment};
use canon_deploy::{Decision, WriteReason};

/// Home directory plus the user's config, loaded once per command.
pub struct Session {
    pub home: PathBuf,
    pub config: Config,
}

impl Session {
    pub fn load() -> Result<Self> {
        let home = user_config::home_dir()?;
        let config = user_config::load_at(&home).context("failed to load ~/.canon/config.yaml")?;
        tracing::debug!("config: {config:?}");
        Ok(Self { home, config })
    }
}

/// Explicit path argument, or the current directory.
pub fn project_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("could not determine current directory"),
    }
}

pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    match seconds {
        s if s < 60 => format!("{s}s ago"),
        s if s < 60 * 60 => format!("{}m ago", s / 60),
        s if s < 60 * 60 * 24 => format!("{}h ago", s / (60 * 60)),
        s => format!("{}d ago", s / (60 * 60 * 24)),
    }
}

/// `#3 2h ago by ana`
pub fn describe_deployment(deployment: &Deployment) -> String {
    let mut text = format!("{} {}", deployment.id, format_age(deployment.deployed_at));
    if let Some(actor) = &deployment.deployed_by {
        text.push_str(&format!(" by {actor}"));
    }
    text
}

pub fn describe_decision(decision: &Decision) -> String {
    match decision {
        Decision::AlreadyUpToDate => "already up to date".green().to_string(),
        Decision::DriftWarning => "blocked: managed files were edited (use --force)"
            .red()
            .to_string(),
        Decision::Write(reason) => {
            let why = match reason {
                WriteReason::EmptyTarget => "first deployment",
                WriteReason::Forced => "forced",
                WriteReason::TemplateChanged => "templates changed",
            };
            format!("write ({why})").yellow().to_string()
        }
    }
}

/// First two names plus a `+N more` tail.
pub fn summarize_files(files: &[String]) -> String {
    let mut names: Vec<String> = files.iter().take(2).cloned().collect();
    if files.len() > names.len() {
        names.push(format!("+{} more", files.len() - names.len()));
    }
    names.join(", ")
}
