//! `canon status`: per-file view of disk vs. last deployment vs. templates.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use canon_core::ManagedDir;
use canon_deploy::{pipeline, Assessment};
use canon_templates::TemplateSet;

use super::{describe_decision, describe_deployment, project_path, summarize_files, Session};

/// Arguments for `canon status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project root or its `.cursor/rules` directory (default: current directory).
    pub path: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::load()?;
        let templates_dir = session.config.templates_dir.as_deref();
        let path = project_path(self.path)?;

        let assessment = pipeline::status(&path, templates_dir)
            .with_context(|| format!("status failed for {}", path.display()))?;
        let rules_dir = ManagedDir::resolve(&path).rules_dir;

        if self.json {
            let payload = StatusJson {
                rules_dir: &rules_dir,
                assessment: &assessment,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        let template_version = TemplateSet::load(templates_dir)
            .map(|set| set.version())
            .context("failed to load templates")?;
        print_table(&rules_dir, &template_version, &assessment);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    rules_dir: &'a Path,
    #[serde(flatten)]
    assessment: &'a Assessment,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "file")]
    file: String,
    #[tabled(rename = "status")]
    status: String,
}

/// Per-file label; an edit outranks every other signal.
fn file_state(name: &str, assessment: &Assessment, on_disk: &BTreeSet<String>) -> &'static str {
    let has = |list: &[String]| list.iter().any(|n| n == name);
    if has(&assessment.drifted) {
        "EDITED"
    } else if has(&assessment.missing) {
        "MISSING"
    } else if !on_disk.contains(name) {
        "NEW"
    } else if has(&assessment.outdated) {
        "OUTDATED"
    } else if has(&assessment.untracked) {
        "UNTRACKED"
    } else {
        "CURRENT"
    }
}

fn colorize(state: &str) -> String {
    match state {
        "CURRENT" => state.green().to_string(),
        "EDITED" | "MISSING" => state.red().to_string(),
        "UNTRACKED" => state.magenta().to_string(),
        _ => state.yellow().to_string(),
    }
}

fn print_table(rules_dir: &Path, template_version: &str, assessment: &Assessment) {
    let last = match &assessment.last_deployment {
        Some(deployment) => format!("last deployment {}", describe_deployment(deployment)),
        None => "never deployed".to_string(),
    };
    println!(
        "Canon v{} | templates {template_version} | {} | {last}",
        env!("CARGO_PKG_VERSION"),
        rules_dir.display(),
    );

    let on_disk: BTreeSet<String> = assessment.current_filenames().into_iter().collect();
    let mut names = on_disk.clone();
    names.extend(assessment.missing.iter().cloned());
    names.extend(assessment.outdated.iter().cloned());

    if !names.is_empty() {
        let rows: Vec<FileRow> = names
            .iter()
            .map(|name| FileRow {
                file: name.clone(),
                status: colorize(file_state(name, assessment, &on_disk)),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    println!("Next deploy: {}", describe_decision(&assessment.decision));
    if !assessment.drifted.is_empty() {
        println!(
            "Edited by hand: {}. Run 'canon diff' to inspect or 'canon deploy --force' to overwrite.",
            summarize_files(&assessment.drifted)
        );
    }
}
