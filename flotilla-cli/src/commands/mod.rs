pub mod clean;
pub mod config;
pub mod doctor;
pub mod init;
pub mod setup;
pub mod status;
pub mod sync;
pub mod validate;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use flotilla_core::{workspace, ConfigKey, RepositoryDescriptor, TierFilter, WorkspaceConfig};
use flotilla_engine::SharedProgress;

/// The workspace a command runs against, with its loaded config.
pub struct Workspace {
    pub root: PathBuf,
    pub config: WorkspaceConfig,
}

impl Workspace {
    /// Discover the workspace from the current directory.
    pub fn open() -> Result<Self> {
        let cwd = std::env::current_dir().context("could not determine current directory")?;
        let root = workspace::require_root(&cwd)?;
        let config = workspace::load_config(&root)
            .with_context(|| format!("failed to load workspace config in {}", root.display()))?;
        Ok(Self { root, config })
    }

    /// Registry entries matching the filters, with presence detected.
    /// Falls back to the configured `default_tier` when no tier is given.
    pub fn scan(&self, tiers: &[TierFilter], names: &[String]) -> Vec<RepositoryDescriptor> {
        let fallback: Vec<TierFilter> = self.config.default_tier.map(TierFilter::Only).into_iter().collect();
        let tiers = if tiers.is_empty() {
            fallback.as_slice()
        } else {
            tiers
        };
        workspace::scan_repos(&self.root, &self.config, tiers, names)
    }
}

/// `--parallel` if given (range-checked like `config set`), else the config value.
pub fn effective_parallel(config: &WorkspaceConfig, flag: Option<usize>) -> Result<usize> {
    match flag {
        Some(n) => checked(config, ConfigKey::ParallelCount, n as u64).map(|v| v as usize),
        None => Ok(config.parallel_count),
    }
}

/// `--timeout` if given (range-checked like `config set`), else `sync_timeout`.
pub fn effective_timeout(config: &WorkspaceConfig, flag: Option<u64>) -> Result<Duration> {
    let secs = match flag {
        Some(n) => checked(config, ConfigKey::SyncTimeout, n)?,
        None => config.sync_timeout,
    };
    Ok(Duration::from_secs(secs))
}

fn checked(config: &WorkspaceConfig, key: ConfigKey, value: u64) -> Result<u64> {
    let mut scratch = config.clone();
    scratch.set(key, &value.to_string())?;
    Ok(value)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

/// Prints `(repo, status)` updates as they arrive. `None` in JSON mode.
pub fn progress_printer(json: bool) -> SharedProgress {
    if json {
        return None;
    }
    Some(Arc::new(|repo: &str, status: &str| {
        eprintln!("  {} {}", format!("{repo:<28}").bold(), status.dimmed());
    }))
}

pub fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub fn check_mark(ok: bool) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}
