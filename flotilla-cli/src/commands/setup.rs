//! `flotilla setup`: install dependencies and hooks in present repositories.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use flotilla_core::TierFilter;
use flotilla_engine::setup::{setup_all, SetupOptions, SetupReport};
use flotilla_engine::ProcessRunner;

use super::{check_mark, effective_parallel, exit_code, print_json, progress_printer, Workspace};

#[derive(Args, Debug)]
pub struct SetupArgs {
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tier: Vec<TierFilter>,

    #[arg(long = "repo", short = 'r', value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Skip virtualenv creation and Python dependencies.
    #[arg(long)]
    pub skip_venv: bool,

    /// Skip `npm install`.
    #[arg(long)]
    pub skip_node: bool,

    /// Skip `pre-commit install`.
    #[arg(long)]
    pub skip_hooks: bool,

    #[arg(long, short = 'p')]
    pub parallel: Option<usize>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SetupRow {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "")]
    ok: String,
    #[tabled(rename = "steps")]
    steps: String,
}

impl SetupArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let ws = Workspace::open()?;
        let repos = ws.scan(&self.tier, &self.repos);
        let options = SetupOptions {
            skip_venv: self.skip_venv || !ws.config.create_venvs,
            skip_node: self.skip_node,
            skip_hooks: self.skip_hooks || !ws.config.install_hooks,
        };

        let reports = setup_all(
            Arc::new(ProcessRunner),
            &repos,
            &options,
            effective_parallel(&ws.config, self.parallel)?,
            progress_printer(self.json),
        )
        .await
        .context("setup failed")?;
        let ok = reports.iter().all(SetupReport::success);

        if self.json {
            print_json(&reports)?;
            return Ok(exit_code(ok));
        }
        if reports.is_empty() {
            println!("No cloned repositories to set up.");
            return Ok(ExitCode::SUCCESS);
        }

        let rows: Vec<SetupRow> = reports
            .iter()
            .map(|r| SetupRow {
                repo: r.name.clone(),
                ok: check_mark(r.success()),
                steps: match &r.error {
                    Some(err) => err.clone(),
                    None => r
                        .steps
                        .iter()
                        .map(|s| format!("{} {}", s.step, check_mark(s.success)))
                        .collect::<Vec<_>>()
                        .join("  "),
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        for report in &reports {
            for step in report.steps.iter().filter(|s| !s.success) {
                println!("  {} {}/{}: {}", check_mark(false), report.name, step.step, step.detail);
            }
        }
        Ok(exit_code(ok))
    }
}
