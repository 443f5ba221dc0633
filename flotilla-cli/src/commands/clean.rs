//! `flotilla clean`: remove build and cache artifacts.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use flotilla_checks::{clean_repo, format_size, ArtifactType, CleanOptions, CleanResult};
use flotilla_core::TierFilter;

use super::{exit_code, print_json, Workspace};

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tier: Vec<TierFilter>,

    #[arg(long = "repo", short = 'r', value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Artifact types: python, venv, node, build, coverage.
    #[arg(long = "type", value_delimiter = ',')]
    pub types: Vec<ArtifactType>,

    /// Report but don't delete.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CleanReport<'a> {
    dry_run: bool,
    bytes_reclaimed: u64,
    results: &'a [CleanResult],
}

#[derive(Tabled)]
struct CleanRow {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "found")]
    found: usize,
    #[tabled(rename = "removed")]
    removed: usize,
    #[tabled(rename = "size")]
    size: String,
}

impl CleanArgs {
    pub fn run(self) -> Result<ExitCode> {
        let ws = Workspace::open()?;
        let options = CleanOptions {
            types: self.types.clone(),
            dry_run: self.dry_run,
        };

        let mut results = Vec::new();
        for repo in ws.scan(&self.tier, &self.repos) {
            let Some(path) = repo.checkout() else {
                continue;
            };
            let result = clean_repo(path, repo.name.as_str(), &options)
                .with_context(|| format!("clean failed for '{}'", repo.name))?;
            results.push(result);
        }
        let total: u64 = results.iter().map(|r| r.bytes_reclaimed).sum();
        let failures = results
            .iter()
            .any(|r| !self.dry_run && r.items_removed < r.items_found);

        if self.json {
            print_json(&CleanReport {
                dry_run: self.dry_run,
                bytes_reclaimed: total,
                results: &results,
            })?;
            return Ok(exit_code(!failures));
        }

        let rows: Vec<CleanRow> = results
            .iter()
            .filter(|r| r.items_found > 0)
            .map(|r| CleanRow {
                repo: r.name.clone(),
                found: r.items_found,
                removed: r.items_removed,
                size: format_size(r.bytes_reclaimed),
            })
            .collect();
        if rows.is_empty() {
            println!("Nothing to clean.");
            return Ok(ExitCode::SUCCESS);
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        if self.dry_run {
            for detail in results.iter().flat_map(|r| &r.details) {
                println!("  {}", detail.dimmed());
            }
            println!("Would reclaim {}", format_size(total).bold());
        } else {
            println!("Reclaimed {}", format_size(total).bold());
        }
        Ok(exit_code(!failures))
    }
}
