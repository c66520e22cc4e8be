//! `canon request`: one JSON request in, one JSON response out.

use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use canon_deploy::pipeline;

use super::Session;

/// Arguments for `canon request`.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Request document, e.g. '{"op":"status","args":{"path":"."}}'.
    /// Read from stdin when omitted.
    pub json: Option<String>,
}

impl RequestArgs {
    pub fn run(self) -> Result<ExitCode> {
        let session = Session::load()?;
        let raw = match self.json {
            Some(raw) => raw,
            None => {
                let mut raw = String::new();
                std::io::stdin()
                    .read_to_string(&mut raw)
                    .context("failed to read request from stdin")?;
                raw
            }
        };

        let response = pipeline::handle_json(&raw, &session.config);
        println!(
            "{}",
            serde_json::to_string(&response).context("failed to serialize response")?
        );
        Ok(if response.ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}
