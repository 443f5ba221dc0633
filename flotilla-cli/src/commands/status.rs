//! `flotilla status`: per-tier dashboard of branch, cleanliness and drift.

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use flotilla_core::{RepoKind, Tier, TierFilter};
use flotilla_engine::status::{collect_health, RepoHealth};
use flotilla_engine::{CiStatus, GhClient, GitProbe, RemoteClient};

use super::{exit_code, print_json, Workspace};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tier: Vec<TierFilter>,

    /// Only show repositories that are dirty or off the default branch.
    #[arg(long)]
    pub failing: bool,

    /// Include open PR count and latest CI status (queries the hosting service).
    #[arg(long)]
    pub ci: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusEntry {
    tier: Tier,
    kind: RepoKind,
    #[serde(flatten)]
    health: RepoHealth,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    total: usize,
    present: usize,
    dirty: usize,
    off_default: usize,
    behind: usize,
}

impl Summary {
    fn of(entries: &[StatusEntry]) -> Self {
        entries.iter().fold(Summary::default(), |mut s, e| {
            let info = &e.health.info;
            s.total += 1;
            if info.present {
                s.present += 1;
                s.dirty += usize::from(info.dirty);
                s.off_default += usize::from(!info.is_on_default());
                s.behind += usize::from(info.behind > 0);
            }
            s
        })
    }
}

#[derive(Serialize)]
struct StatusReport<'a> {
    summary: Summary,
    repos: &'a [StatusEntry],
}

#[derive(Tabled)]
struct LocalRow {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "↑/↓")]
    drift: String,
}

#[derive(Tabled)]
struct CiRow {
    #[tabled(inline)]
    local: LocalRow,
    #[tabled(rename = "PRs")]
    prs: String,
    #[tabled(rename = "CI")]
    ci: String,
}

impl StatusArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let ws = Workspace::open()?;
        let repos = ws.scan(&self.tier, &[] as &[String]);

        let remote: Option<Arc<dyn RemoteClient>> = if self.ci {
            Some(Arc::new(GhClient::default()))
        } else {
            None
        };
        let health = collect_health(
            Arc::new(GitProbe::default()),
            remote,
            &repos,
            ws.config.parallel_count,
        )
        .await
        .context("status collection failed")?;

        let mut entries: Vec<StatusEntry> = repos
            .iter()
            .zip(health)
            .map(|(repo, health)| StatusEntry {
                tier: repo.tier,
                kind: repo.kind,
                health,
            })
            .collect();
        if self.failing {
            entries.retain(|e| e.health.info.needs_attention());
        }

        let ok = entries.iter().all(|e| e.health.error.is_none());
        let summary = Summary::of(&entries);

        if self.json {
            print_json(&StatusReport {
                summary,
                repos: &entries,
            })?;
            return Ok(exit_code(ok));
        }

        let mut by_tier: BTreeMap<Tier, Vec<&StatusEntry>> = BTreeMap::new();
        for entry in &entries {
            by_tier.entry(entry.tier).or_default().push(entry);
        }
        if by_tier.is_empty() {
            println!("No repositories match.");
        }
        for (tier, rows) in by_tier {
            println!("{}", tier.to_string().bold());
            let mut table = if self.ci {
                Table::new(rows.into_iter().map(ci_row))
            } else {
                Table::new(rows.into_iter().map(local_row))
            };
            table.with(Style::rounded());
            println!("{table}");
        }

        println!(
            "{} repos | {} cloned | {} dirty | {} off default | {} behind",
            summary.total, summary.present, summary.dirty, summary.off_default, summary.behind
        );
        Ok(exit_code(ok))
    }
}

fn local_row(entry: &StatusEntry) -> LocalRow {
    let info = &entry.health.info;
    if !info.present {
        return LocalRow {
            repo: info.name.clone(),
            branch: "-".to_string(),
            state: "not cloned".bright_black().to_string(),
            drift: "-".to_string(),
        };
    }
    let state = if info.dirty {
        format!("dirty ({})", info.uncommitted.len()).yellow().to_string()
    } else if !info.is_on_default() {
        "off default".yellow().to_string()
    } else {
        "clean".green().to_string()
    };
    LocalRow {
        repo: info.name.clone(),
        branch: info.branch.clone().unwrap_or_else(|| "?".to_string()),
        state,
        drift: format!("{}/{}", info.ahead, info.behind),
    }
}

fn ci_row(entry: &StatusEntry) -> CiRow {
    let ci = match entry.health.ci {
        Some(CiStatus::Passing) => "passing".green().to_string(),
        Some(CiStatus::Failing) => "failing".red().to_string(),
        Some(CiStatus::Pending) => "pending".yellow().to_string(),
        None => "-".to_string(),
    };
    CiRow {
        local: local_row(entry),
        prs: entry
            .health
            .open_prs
            .map_or_else(|| "-".to_string(), |n| n.to_string()),
        ci,
    }
}
