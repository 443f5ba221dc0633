//! Environment diagnostics: required tools, hosting auth, workspace health.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use flotilla_core::workspace::{self, CONFIG_FILENAME};
use flotilla_engine::process::{CommandRunner, CommandSpec};
use flotilla_engine::{ProcessError, RemoteClient};

/// Tools a workspace needs, with the oldest supported version.
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("git", "2.30"),
    ("gh", "2.0"),
    ("python", "3.10"),
    ("uv", "0.1"),
    ("node", "18.0"),
];

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LISTED_LOCKS: usize = 5;

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("static regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticResult {
    pub name: String,
    pub status: Severity,
    pub message: String,
    pub fixable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_command: Option<String>,
    pub fixed: bool,
}

impl DiagnosticResult {
    fn new(name: impl Into<String>, status: Severity, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            fixable: false,
            fix_command: None,
            fixed: false,
        }
    }

    fn fixable_with(mut self, command: &str) -> Self {
        self.fixable = true;
        self.fix_command = Some(command.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<DiagnosticResult>,
}

impl DoctorReport {
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.status == Severity::Ok)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, status: Severity) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorOptions {
    /// Workspace to inspect; tool checks only when `None`.
    pub root: Option<PathBuf>,
    pub fix: bool,
}

/// Run every diagnostic. Never fails; problems are reported as checks.
pub async fn run_diagnostics(
    runner: &dyn CommandRunner,
    remote: &dyn RemoteClient,
    options: &DoctorOptions,
) -> DoctorReport {
    let mut report = DoctorReport::default();

    let mut gh_found = false;
    for (tool, min_version) in REQUIRED_TOOLS {
        let result = check_tool(runner, tool, min_version).await;
        if *tool == "gh" {
            gh_found = result.status != Severity::Error;
        }
        report.checks.push(result);
    }
    if gh_found {
        report.checks.push(check_auth(remote).await);
    }

    if let Some(root) = &options.root {
        report.checks.push(check_workspace_config(root));
        report.checks.push(check_stale_locks(root, options.fix));
    }

    tracing::info!(
        errors = report.error_count(),
        warnings = report.warning_count(),
        "diagnostics complete"
    );
    report
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

async fn check_tool(runner: &dyn CommandRunner, name: &str, min_version: &str) -> DiagnosticResult {
    let spec = CommandSpec::new(name, ["--version"], VERSION_TIMEOUT);
    let output = match runner.run(&spec).await {
        Ok(output) => output,
        Err(ProcessError::NotFound { .. }) => {
            return DiagnosticResult::new(
                format!("{name} installed"),
                Severity::Error,
                format!("{name} not found in PATH"),
            )
        }
        Err(e) => {
            tracing::debug!(tool = name, error = %e, "version probe failed");
            return DiagnosticResult::new(
                format!("{name} version"),
                Severity::Warning,
                format!("{name} found but version check failed"),
            );
        }
    };

    let text = match output.stdout.trim() {
        "" => output.stderr.trim(),
        out => out,
    };
    let reported = text.lines().next().unwrap_or_default();
    let check = format!("{name} version");

    match (parse_version(reported), parse_version(min_version)) {
        (Some(found), Some(min)) if found < min => DiagnosticResult::new(
            check,
            Severity::Warning,
            format!("{name}: {reported} (older than required {min_version})"),
        ),
        _ => DiagnosticResult::new(check, Severity::Ok, format!("{name}: {reported}")),
    }
}

async fn check_auth(remote: &dyn RemoteClient) -> DiagnosticResult {
    if remote.check_auth().await {
        DiagnosticResult::new("gh auth", Severity::Ok, "Authenticated with the hosting service")
    } else {
        DiagnosticResult::new("gh auth", Severity::Warning, "gh is not authenticated")
            .fixable_with("gh auth login")
    }
}

fn check_workspace_config(root: &Path) -> DiagnosticResult {
    const NAME: &str = "workspace config";

    if !workspace::config_path(root).exists() {
        return DiagnosticResult::new(NAME, Severity::Warning, format!("No {CONFIG_FILENAME} found"))
            .fixable_with("flotilla init");
    }
    match workspace::load_config(root) {
        Ok(_) => DiagnosticResult::new(NAME, Severity::Ok, "Config file valid"),
        Err(e) => DiagnosticResult::new(NAME, Severity::Error, format!("Config file corrupted: {e}"))
            .fixable_with("flotilla init --force"),
    }
}

fn check_stale_locks(root: &Path, fix: bool) -> DiagnosticResult {
    const NAME: &str = "stale locks";

    let locks = find_stale_locks(root);
    if locks.is_empty() {
        return DiagnosticResult::new(NAME, Severity::Ok, "No stale lock files found");
    }

    let listed: Vec<String> = locks
        .iter()
        .take(MAX_LISTED_LOCKS)
        .map(|l| l.strip_prefix(root).unwrap_or(l).display().to_string())
        .collect();

    if fix {
        let failed: Vec<&PathBuf> = locks
            .iter()
            .filter(|lock| match fs::remove_file(lock) {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!(path = %lock.display(), error = %e, "could not remove lock file");
                    true
                }
            })
            .collect();
        if failed.is_empty() {
            let mut result = DiagnosticResult::new(
                NAME,
                Severity::Ok,
                format!("Removed {} stale lock file(s): {}", locks.len(), listed.join(", ")),
            );
            result.fixed = true;
            return result;
        }
    }

    DiagnosticResult::new(
        NAME,
        Severity::Warning,
        format!("Found {} stale lock file(s): {}", locks.len(), listed.join(", ")),
    )
    .fixable_with("flotilla doctor --fix")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `.git/index.lock` and `.git/refs/heads/*.lock` in every checkout under `root`.
pub fn find_stale_locks(root: &Path) -> Vec<PathBuf> {
    let mut locks = Vec::new();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(".git") => {
                walker.skip_current_dir();
                let git = entry.path();
                let index = git.join("index.lock");
                if index.is_file() {
                    locks.push(index);
                }
                locks.extend(
                    WalkDir::new(git.join("refs/heads"))
                        .sort_by_file_name()
                        .into_iter()
                        .filter_map(Result::ok)
                        .filter(|e| e.file_type().is_file())
                        .filter(|e| e.path().extension().is_some_and(|ext| ext == "lock"))
                        .map(|e| e.into_path()),
                );
            }
            Some("node_modules") => walker.skip_current_dir(),
            _ => {}
        }
    }
    locks
}

/// `(major, minor, patch)` from the first dotted version in `text`.
fn parse_version(text: &str) -> Option<(u32, u32, u32)> {
    let caps = VERSION.captures(text)?;
    let part = |i: usize| -> Option<u32> { caps.get(i).and_then(|m| m.as_str().parse().ok()) };
    Some((part(1)?, part(2)?, part(3).unwrap_or(0)))
}
