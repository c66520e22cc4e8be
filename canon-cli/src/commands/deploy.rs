//! `canon deploy`: render, reconcile, write and record.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use canon_core::ManagedDir;
use canon_deploy::{
    pipeline::{self, DeployReport},
    Assessment, DeployRequest, Outcome,
};

use super::{describe_decision, describe_deployment, project_path, Session};

/// Exit status when managed files were edited and `--force` was not given.
pub const DRIFT_EXIT_CODE: u8 = 2;

/// Arguments for `canon deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Project root or its `.cursor/rules` directory (default: current directory).
    pub path: Option<PathBuf>,

    /// Overwrite managed files even if they were edited since the last deploy.
    #[arg(long)]
    pub force: bool,

    /// Do not snapshot existing files before overwriting them.
    #[arg(long)]
    pub no_backup: bool,

    /// Actor recorded in the deployment history.
    #[arg(long = "by", value_name = "NAME")]
    pub deployed_by: Option<String>,

    /// Show what deploy would do without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    pub fn run(self) -> Result<ExitCode> {
        let session = Session::load()?;
        let path = project_path(self.path)?;
        let request = DeployRequest {
            path: path.clone(),
            force_update: self.force,
            backup: !self.no_backup,
            deployed_by: self.deployed_by,
            dry_run: self.dry_run,
        }
        .with_defaults(&session.config);

        let report = pipeline::deploy(&request, session.config.templates_dir.as_deref())
            .with_context(|| format!("deploy failed for {}", path.display()))?;

        let code = match &report {
            DeployReport::Applied(Outcome::DriftWarning { .. }) => ExitCode::from(DRIFT_EXIT_CODE),
            _ => ExitCode::SUCCESS,
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize deploy JSON")?
            );
            return Ok(code);
        }

        let rules_dir = ManagedDir::resolve(&path).rules_dir;
        match report {
            DeployReport::Planned(assessment) => print_plan(&rules_dir, &assessment),
            DeployReport::Applied(outcome) => print_outcome(&rules_dir, outcome),
        }
        Ok(code)
    }
}

fn print_plan(rules_dir: &Path, assessment: &Assessment) {
    println!(
        "[dry-run] {}: {}",
        rules_dir.display(),
        describe_decision(&assessment.decision)
    );
    for name in &assessment.drifted {
        println!("  ✗  {name} (edited)");
    }
    for name in &assessment.outdated {
        if !assessment.drifted.contains(name) {
            println!("  ~  {name}");
        }
    }
}

fn print_outcome(rules_dir: &Path, outcome: Outcome) {
    match outcome {
        Outcome::AlreadyUpToDate => {
            println!("{} {} — already up to date", "✓".green(), rules_dir.display());
        }
        Outcome::DriftWarning {
            files,
            last_deployment,
        } => {
            println!(
                "{} {} managed file(s) edited since deployment {}",
                "⚠".yellow().bold(),
                files.len(),
                describe_deployment(&last_deployment),
            );
            for name in &files {
                println!("  ✗  {name}");
            }
            println!("Nothing was written. Re-run with --force to overwrite (backup is kept unless --no-backup).");
        }
        Outcome::Deployed {
            deployment_id,
            filenames,
            backup_path,
        } => {
            println!(
                "{} deployment {deployment_id}: wrote {} file(s) to {}",
                "✓".green(),
                filenames.len(),
                rules_dir.display()
            );
            for name in &filenames {
                println!("  ✎  {name}");
            }
            if let Some(backup) = backup_path {
                println!("  backup: {}", backup.display());
            }
        }
    }
}
