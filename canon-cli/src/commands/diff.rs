//! `canon diff`: unified diffs for what deploy would write.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use canon_deploy::pipeline;

use super::{project_path, Session};

/// Arguments for `canon diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Project root or its `.cursor/rules` directory (default: current directory).
    pub path: Option<PathBuf>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::load()?;
        let path = project_path(self.path)?;

        let diffs = pipeline::diff(&path, session.config.templates_dir.as_deref())
            .with_context(|| format!("diff failed for {}", path.display()))?;

        if diffs.is_empty() {
            println!("No differences for {}.", path.display());
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
