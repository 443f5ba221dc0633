//! `flotilla doctor`: toolchain and workspace diagnostics.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use flotilla_checks::{run_diagnostics, DiagnosticResult, DoctorOptions, Severity};
use flotilla_core::workspace;
use flotilla_engine::{GhClient, ProcessRunner};

use super::{exit_code, print_json};

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Remove stale lock files.
    #[arg(long)]
    pub fix: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct DoctorRow {
    #[tabled(rename = "check")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    message: String,
}

impl DoctorArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let root = std::env::current_dir()
            .ok()
            .and_then(|cwd| workspace::discover_root(&cwd));
        let options = DoctorOptions {
            root,
            fix: self.fix,
        };
        let report = run_diagnostics(&ProcessRunner, &GhClient::default(), &options).await;
        let ok = report.error_count() == 0;

        if self.json {
            print_json(&report)?;
            return Ok(exit_code(ok));
        }

        let rows: Vec<DoctorRow> = report.checks.iter().map(row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        for check in report.checks.iter().filter(|c| c.status != Severity::Ok) {
            if let Some(fix) = &check.fix_command {
                println!("  {} {}: run `{fix}`", "→".cyan(), check.name);
            }
        }

        if report.all_ok() {
            println!("{}", "All checks passed.".green());
        } else {
            println!(
                "{} error(s), {} warning(s)",
                report.error_count(),
                report.warning_count()
            );
        }
        Ok(exit_code(ok))
    }
}

fn row(check: &DiagnosticResult) -> DoctorRow {
    let status = match check.status {
        Severity::Ok if check.fixed => "fixed".green().to_string(),
        Severity::Ok => "ok".green().to_string(),
        Severity::Warning => "warning".yellow().to_string(),
        Severity::Error => "error".red().to_string(),
    };
    DoctorRow {
        name: check.name.clone(),
        status,
        message: check.message.clone(),
    }
}
