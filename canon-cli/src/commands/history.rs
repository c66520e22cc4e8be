//! `canon history`: recorded deployments, newest first.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use canon_deploy::{pipeline::{self, HistoryEntry}, HistoryRequest};

use super::{format_age, project_path, Session};

/// Arguments for `canon history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Project root or its `.cursor/rules` directory (default: current directory).
    pub path: Option<PathBuf>,

    /// Maximum number of deployments to show (default from config).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Also list the file hashes recorded by each deployment.
    #[arg(long)]
    pub files: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl HistoryArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::load()?;
        let path = project_path(self.path)?;
        let request = HistoryRequest {
            path: path.clone(),
            limit: self.limit.unwrap_or(session.config.history_limit),
            files: self.files,
        };

        let entries = pipeline::history(&request)
            .with_context(|| format!("history failed for {}", path.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&entries)
                    .context("failed to serialize history JSON")?
            );
            return Ok(());
        }

        if entries.is_empty() {
            println!("No deployments recorded for {}.", path.display());
            return Ok(());
        }
        print_table(&entries);
        if self.files {
            print_files(&entries);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "deployed")]
    deployed: String,
    #[tabled(rename = "by")]
    by: String,
    #[tabled(rename = "files")]
    files: usize,
    #[tabled(rename = "templates")]
    templates: String,
    #[tabled(rename = "backup")]
    backup: String,
}

fn print_table(entries: &[HistoryEntry]) {
    let rows: Vec<HistoryRow> = entries
        .iter()
        .map(|entry| {
            let d = &entry.deployment;
            HistoryRow {
                id: d.id.to_string(),
                deployed: format!(
                    "{} ({})",
                    d.deployed_at.format("%Y-%m-%d %H:%M:%S"),
                    format_age(d.deployed_at)
                ),
                by: d.deployed_by.clone().unwrap_or_else(|| "-".to_string()),
                files: d.file_count,
                templates: d.template_version.clone(),
                backup: d
                    .backup_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn print_files(entries: &[HistoryEntry]) {
    for entry in entries {
        let Some(files) = &entry.files else {
            continue;
        };
        println!("{}", entry.deployment.id);
        for record in files {
            println!("  {}  {}", record.content_hash.short(), record.filename);
        }
    }
}
