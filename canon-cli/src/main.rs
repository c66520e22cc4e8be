//! Canon: deploys the standards rule bundle into `.cursor/rules/`.
//!
//! # Usage
//!
//! ```text
//! canon deploy [PATH] [--force] [--no-backup] [--by NAME] [--dry-run] [--json]
//! canon status [PATH] [--json]
//! canon diff [PATH]
//! canon history [PATH] [--limit N] [--files] [--json]
//! canon config show [--json]
//! canon config set <KEY> <VALUE>
//! canon request [JSON]
//! ```
//!
//! `deploy` exits with status 2 when it refuses to overwrite hand-edited files.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    config::ConfigCommand, deploy::DeployArgs, diff::DiffArgs, history::HistoryArgs,
    request::RequestArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "canon",
    version,
    about = "Deploy and reconcile standards rule files for a project",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the rule bundle and write it unless managed files were edited.
    Deploy(DeployArgs),

    /// Compare the managed files with the last deployment and the templates.
    Status(StatusArgs),

    /// Show a unified diff of what deploy would change.
    Diff(DiffArgs),

    /// List recorded deployments, newest first.
    History(HistoryArgs),

    /// Show or change defaults in ~/.canon/config.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Execute one JSON request and print the JSON response.
    Request(RequestArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Deploy(args) => args.run(),
        Commands::Status(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::Diff(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::History(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::Config { command } => commands::config::run(command).map(|()| ExitCode::SUCCESS),
        Commands::Request(args) => args.run(),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
