//! Flotilla: multi-repository workspace management.
//!
//! # Usage
//!
//! ```text
//! flotilla init [-w DIR] [-t P0..P3|all] [-r a,b] [-p N] [--skip-setup] [--force]
//! flotilla sync [-t ..] [-r ..] [--pull] [--force] [-p N] [--timeout SECS]
//! flotilla setup [-t ..] [-r ..] [--skip-venv] [--skip-node] [--skip-hooks]
//! flotilla status [-t ..] [--failing] [--ci]
//! flotilla validate [-t ..] [-r ..] [-c constitution,context,links,hooks] [--fix]
//! flotilla doctor [--fix]
//! flotilla clean [-t ..] [-r ..] [--type python,venv,node,build,coverage] [--dry-run]
//! flotilla config get|set|list|reset
//! ```
//!
//! Every command accepts `--json`.

mod commands;
mod logging;
mod rotation;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    clean::CleanArgs, config::ConfigCommand, doctor::DoctorArgs, init::InitArgs,
    setup::SetupArgs, status::StatusArgs, sync::SyncArgs, validate::ValidateArgs,
};
use flotilla_core::workspace;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "flotilla",
    version,
    about = "Clone, sync and keep healthy a fleet of repositories",
    long_about = None,
)]
struct Cli {
    /// Also log to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone the registry into the current directory and set it up.
    Init(InitArgs),

    /// Fetch (and optionally fast-forward) every present repository.
    Sync(SyncArgs),

    /// Install dependencies and hooks in present repositories.
    Setup(SetupArgs),

    /// Show branch, dirty state and drift across the workspace.
    Status(StatusArgs),

    /// Check repositories against workspace conventions.
    Validate(ValidateArgs),

    /// Diagnose the toolchain and workspace.
    Doctor(DoctorArgs),

    /// Remove build and cache artifacts.
    Clean(CleanArgs),

    /// Read and write workspace settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

impl Cli {
    async fn run(self) -> Result<ExitCode> {
        match self.command {
            Commands::Init(args) => args.run().await,
            Commands::Sync(args) => args.run().await,
            Commands::Setup(args) => args.run().await,
            Commands::Status(args) => args.run().await,
            Commands::Validate(args) => args.run(),
            Commands::Doctor(args) => args.run().await,
            Commands::Clean(args) => args.run(),
            Commands::Config { command } => commands::config::run(command),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let root = std::env::current_dir()
        .ok()
        .and_then(|cwd| workspace::discover_root(&cwd));
    if let Err(err) = logging::init_tracing(root.as_deref(), cli.verbose) {
        eprintln!("{} {err:#}", "warning:".yellow().bold());
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{} failed to start runtime: {err}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli.run()) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
