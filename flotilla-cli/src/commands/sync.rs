//! `flotilla sync`: fetch and optionally fast-forward present repositories.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use flotilla_core::TierFilter;
use flotilla_engine::{sync_all, Action, GitProbe, SyncOptions, SyncTarget, Tally, TaskOutcome};

use super::{
    check_mark, effective_parallel, effective_timeout, exit_code, print_json, progress_printer, Workspace,
};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Tiers to sync (P0, P1, P2, P3, all).
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tier: Vec<TierFilter>,

    /// Specific repositories to sync.
    #[arg(long = "repo", short = 'r', value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Fast-forward repositories that are behind upstream.
    #[arg(long)]
    pub pull: bool,

    /// Sync even when the working tree is dirty.
    #[arg(long)]
    pub force: bool,

    /// Concurrent syncs (1-16). Defaults to `parallel_count`.
    #[arg(long, short = 'p')]
    pub parallel: Option<usize>,

    /// Per-operation timeout in seconds. Defaults to `sync_timeout`.
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SyncReport<'a> {
    summary: Tally,
    not_cloned: &'a [String],
    results: &'a [TaskOutcome],
}

#[derive(Tabled)]
struct SyncRow {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "")]
    ok: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "↑")]
    ahead: u32,
    #[tabled(rename = "↓")]
    behind: u32,
    #[tabled(rename = "detail")]
    detail: String,
}

impl SyncArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let ws = Workspace::open()?;
        let repos = ws.scan(&self.tier, &self.repos);

        let not_cloned: Vec<String> = repos
            .iter()
            .filter(|r| !r.is_present())
            .map(|r| r.name.to_string())
            .collect();
        let targets: Vec<SyncTarget> = repos.iter().filter_map(SyncTarget::from_descriptor).collect();

        let options = SyncOptions {
            pull: self.pull || ws.config.auto_pull,
            force: self.force,
            parallel: effective_parallel(&ws.config, self.parallel)?,
            timeout: effective_timeout(&ws.config, self.timeout)?,
        };

        let outcomes = sync_all(
            Arc::new(GitProbe::default()),
            targets,
            &options,
            progress_printer(self.json),
        )
        .await
        .context("sync failed")?;
        let tally = Tally::of(&outcomes);

        if self.json {
            print_json(&SyncReport {
                summary: tally,
                not_cloned: &not_cloned,
                results: &outcomes,
            })?;
            return Ok(exit_code(tally.failed == 0));
        }

        if outcomes.is_empty() {
            println!("No cloned repositories to sync. Run `flotilla init` first.");
            return Ok(ExitCode::SUCCESS);
        }

        let rows: Vec<SyncRow> = outcomes
            .iter()
            .map(|o| SyncRow {
                repo: o.name().to_string(),
                ok: check_mark(o.success()),
                action: colorize(o.action()),
                ahead: o.ahead(),
                behind: o.behind(),
                detail: o.message().to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        println!(
            "Synced: {} | Skipped: {} | Failed: {}",
            tally.succeeded, tally.skipped, tally.failed
        );
        if !not_cloned.is_empty() {
            println!(
                "{} {} not cloned: {}",
                "!".yellow(),
                not_cloned.len(),
                not_cloned.join(", ")
            );
        }
        Ok(exit_code(tally.failed == 0))
    }
}

fn colorize(action: Action) -> String {
    let label = action.to_string();
    match action {
        Action::Pulled | Action::Cloned => label.green().to_string(),
        Action::Fetched => label,
        Action::Skipped => label.yellow().to_string(),
        Action::Failed => label.red().to_string(),
    }
}
