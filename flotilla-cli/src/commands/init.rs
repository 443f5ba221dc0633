//! `flotilla init`: clone the registry and set up the workspace.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use flotilla_core::{registry, workspace, TierFilter, WorkspaceConfig};
use flotilla_engine::setup::{setup_all, SetupOptions, SetupReport};
use flotilla_engine::{
    clone_all, CloneOptions, GhClient, ProcessRunner, Tally, TaskOutcome,
};

use super::{check_mark, effective_parallel, exit_code, print_json, progress_printer};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Workspace root directory.
    #[arg(long, short = 'w', default_value = ".")]
    pub workspace: PathBuf,

    /// Tiers to clone (P0, P1, P2, P3, all).
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tier: Vec<TierFilter>,

    /// Specific repositories to clone.
    #[arg(long = "repo", short = 'r', value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Concurrent clones (1-16). Defaults to `parallel_count`.
    #[arg(long, short = 'p')]
    pub parallel: Option<usize>,

    /// Skip dependency installation.
    #[arg(long)]
    pub skip_setup: bool,

    /// Replace an existing or corrupted workspace config with defaults.
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct InitReport<'a> {
    workspace: String,
    repos_requested: usize,
    summary: Tally,
    results: &'a [TaskOutcome],
    setup: &'a [SetupReport],
}

#[derive(Tabled)]
struct CloneRow {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "")]
    ok: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl InitArgs {
    pub async fn run(self) -> Result<ExitCode> {
        std::fs::create_dir_all(&self.workspace)
            .with_context(|| format!("cannot create workspace '{}'", self.workspace.display()))?;
        let root = self
            .workspace
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.workspace.display()))?;

        let config = if workspace::config_path(&root).exists() && !self.force {
            workspace::load_config(&root).context(
                "existing workspace config is invalid; rerun with --force to replace it",
            )?
        } else {
            WorkspaceConfig::default()
        };
        let parallel = effective_parallel(&config, self.parallel)?;
        workspace::save_config(&root, &config).context("failed to write workspace config")?;

        let repos = registry::filter_by_tier(workspace::registry_for(&config), &self.tier);
        let repos = registry::filter_by_name(repos, &self.repos);

        if !self.json {
            println!("{} {}", "Initializing workspace:".bold(), root.display());
            println!("Repos: {} | Parallel: {parallel}\n", repos.len());
        }

        let options = CloneOptions {
            parallel,
            ..CloneOptions::default()
        };
        let outcomes = clone_all(
            Arc::new(GhClient::default()),
            &repos,
            &root,
            &options,
            progress_printer(self.json),
        )
        .await
        .context("clone failed")?;
        let tally = Tally::of(&outcomes);

        let setup = if self.skip_setup {
            Vec::new()
        } else {
            let present = workspace::scan_repos(&root, &config, &self.tier, &self.repos);
            let setup_options = SetupOptions {
                skip_venv: !config.create_venvs,
                skip_node: false,
                skip_hooks: !config.install_hooks,
            };
            setup_all(
                Arc::new(ProcessRunner),
                &present,
                &setup_options,
                parallel,
                progress_printer(self.json),
            )
            .await
            .context("setup failed")?
        };

        let ok = tally.failed == 0 && setup.iter().all(SetupReport::success);

        if self.json {
            print_json(&InitReport {
                workspace: root.display().to_string(),
                repos_requested: repos.len(),
                summary: tally,
                results: &outcomes,
                setup: &setup,
            })?;
            return Ok(exit_code(ok));
        }

        let rows: Vec<CloneRow> = outcomes
            .iter()
            .map(|o| CloneRow {
                repo: o.name().to_string(),
                ok: check_mark(o.success()),
                action: o.action().to_string(),
                detail: o.message().to_string(),
            })
            .collect();
        if !rows.is_empty() {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        println!(
            "\n{} Cloned: {} | Skipped: {} | {} Failed: {}",
            check_mark(true),
            tally.succeeded,
            tally.skipped,
            check_mark(false),
            tally.failed
        );
        for report in setup.iter().filter(|r| !r.success()) {
            println!("{} setup incomplete for '{}'", "!".yellow(), report.name);
        }
        Ok(exit_code(ok))
    }
}
