//! `flotilla validate`: convention checks across present repositories.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use flotilla_checks::{validate_repo, CheckKind, ValidateOptions, ValidationResult};
use flotilla_core::{TierFilter, WorkspaceConfig};

use super::{check_mark, exit_code, print_json, Workspace};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tier: Vec<TierFilter>,

    #[arg(long = "repo", short = 'r', value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Checks to run (constitution, context, links, hooks). Defaults to the
    /// checks enabled in the workspace config.
    #[arg(long = "check", short = 'c', value_delimiter = ',')]
    pub checks: Vec<CheckKind>,

    /// Scaffold fixes for auto-fixable failures.
    #[arg(long)]
    pub fix: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RepoValidation<'a> {
    #[serde(flatten)]
    result: &'a ValidationResult,
    score: f64,
}

#[derive(Tabled)]
struct ValidateRow {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "score")]
    score: String,
    #[tabled(rename = "passed")]
    passed: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "fixed")]
    fixed: usize,
}

impl ValidateArgs {
    pub fn run(self) -> Result<ExitCode> {
        let ws = Workspace::open()?;
        let options = ValidateOptions {
            checks: selected_checks(&self.checks, &ws.config),
            auto_fix: self.fix || ws.config.auto_fix,
        };

        let mut results = Vec::new();
        for repo in ws.scan(&self.tier, &self.repos) {
            let Some(path) = repo.checkout() else {
                continue;
            };
            let result = validate_repo(path, repo.name.as_str(), &options)
                .with_context(|| format!("validation failed for '{}'", repo.name))?;
            results.push(result);
        }
        let ok = results.iter().all(ValidationResult::all_passed);

        if self.json {
            let payload: Vec<RepoValidation> = results
                .iter()
                .map(|result| RepoValidation {
                    result,
                    score: result.score(),
                })
                .collect();
            print_json(&payload)?;
            return Ok(exit_code(ok));
        }

        if results.is_empty() {
            println!("No cloned repositories to validate.");
            return Ok(ExitCode::SUCCESS);
        }

        let rows: Vec<ValidateRow> = results
            .iter()
            .map(|r| ValidateRow {
                repo: r.repo.clone(),
                score: score_label(r.score()),
                passed: r.passed_count(),
                failed: r.failed_count(),
                fixed: r.fixed_count(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        for result in &results {
            for check in result.checks.iter().filter(|c| !c.passed || c.fixed) {
                let hint = if !check.passed && check.auto_fixable {
                    " (fixable with --fix)".dimmed().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {} {}: {}{hint}",
                    check_mark(check.passed),
                    result.repo,
                    check.message
                );
            }
        }
        Ok(exit_code(ok))
    }
}

/// Explicit `--check` wins; otherwise every check the config leaves enabled.
fn selected_checks(explicit: &[CheckKind], config: &WorkspaceConfig) -> Vec<CheckKind> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    CheckKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            CheckKind::Constitution => config.constitution_check,
            CheckKind::Links => config.link_check,
            CheckKind::Context | CheckKind::Hooks => true,
        })
        .collect()
}

fn score_label(score: f64) -> String {
    let label = format!("{score:.0}%");
    if score >= 100.0 {
        label.green().to_string()
    } else if score >= 50.0 {
        label.yellow().to_string()
    } else {
        label.red().to_string()
    }
}
