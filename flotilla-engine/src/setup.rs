//! Dependency setup for present checkouts.
//!
//! Steps by kind:
//!
//! ```text
//! python / mixed   venv         uv venv                      30s
//!                  python_deps  uv pip install -e . | -r ..  120s   (needs pyproject.toml or requirements.txt)
//! nodejs / mixed   node_deps    npm install                  120s   (needs package.json)
//! any              hooks        pre-commit install           30s    (needs .pre-commit-config.yaml)
//! ```
//!
//! A step whose manifest is missing counts as done.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use flotilla_core::{RepoKind, RepositoryDescriptor};

use crate::dispatcher::{DispatchOutcome, Dispatcher, Job, TaskFailure};
use crate::error::EngineError;
use crate::process::{CommandRunner, CommandSpec};
use crate::progress::{emit, SharedProgress};

const SHORT_STEP: Duration = Duration::from_secs(30);
const INSTALL_STEP: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    Venv,
    PythonDeps,
    NodeDeps,
    Hooks,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetupStep::Venv => "venv",
            SetupStep::PythonDeps => "python_deps",
            SetupStep::NodeDeps => "node_deps",
            SetupStep::Hooks => "hooks",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: SetupStep,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupOptions {
    pub skip_venv: bool,
    pub skip_node: bool,
    pub skip_hooks: bool,
}

/// Steps run for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub name: String,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SetupReport {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.steps.iter().all(|s| s.success)
    }
}

impl DispatchOutcome for SetupReport {
    fn from_failure(name: &str, failure: TaskFailure) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
            error: Some(failure.to_string()),
        }
    }
}

/// Run the applicable steps for one checkout, in order.
pub async fn setup_repo(
    runner: &dyn CommandRunner,
    path: &Path,
    kind: RepoKind,
    options: &SetupOptions,
) -> Vec<StepResult> {
    let mut results = Vec::new();

    if kind.uses_python() && !options.skip_venv {
        results.push(run_step(runner, path, SetupStep::Venv, &["uv", "venv"], SHORT_STEP).await);

        let step = SetupStep::PythonDeps;
        let result = if path.join("pyproject.toml").exists() {
            run_step(runner, path, step, &["uv", "pip", "install", "-e", "."], INSTALL_STEP).await
        } else if path.join("requirements.txt").exists() {
            let argv = ["uv", "pip", "install", "-r", "requirements.txt"];
            run_step(runner, path, step, &argv, INSTALL_STEP).await
        } else {
            nothing_to_do(step, "no python manifest")
        };
        results.push(result);
    }

    if kind.uses_node() && !options.skip_node {
        let step = SetupStep::NodeDeps;
        results.push(if path.join("package.json").exists() {
            run_step(runner, path, step, &["npm", "install"], INSTALL_STEP).await
        } else {
            nothing_to_do(step, "no package.json")
        });
    }

    if !options.skip_hooks {
        let step = SetupStep::Hooks;
        results.push(if path.join(".pre-commit-config.yaml").exists() {
            run_step(runner, path, step, &["pre-commit", "install"], SHORT_STEP).await
        } else {
            nothing_to_do(step, "no .pre-commit-config.yaml")
        });
    }

    results
}

/// Set up every present repository through the dispatcher. Absent ones are
/// left out of the result.
pub async fn setup_all(
    runner: Arc<dyn CommandRunner>,
    repos: &[RepositoryDescriptor],
    options: &SetupOptions,
    parallel: usize,
    progress: SharedProgress,
) -> Result<Vec<SetupReport>, EngineError> {
    let dispatcher = Dispatcher::new(parallel)?;

    let targets: Vec<(String, PathBuf, RepoKind)> = repos
        .iter()
        .filter_map(|r| r.checkout().map(|p| (r.name.to_string(), p.to_path_buf(), r.kind)))
        .collect();

    let jobs = targets.into_iter().map(|(name, path, kind)| {
        let runner = Arc::clone(&runner);
        let options = options.clone();
        let progress = progress.clone();
        Job::new(name.clone(), async move {
            emit(&progress, &name, "setting up...");
            let steps = setup_repo(runner.as_ref(), &path, kind, &options).await;
            let report = SetupReport {
                name,
                steps,
                error: None,
            };
            let status = if report.success() { "✓ ready" } else { "✗ incomplete" };
            emit(&progress, &report.name, status);
            Ok::<_, EngineError>(report)
        })
    });

    Ok(dispatcher.run(jobs).await)
}

async fn run_step(
    runner: &dyn CommandRunner,
    path: &Path,
    step: SetupStep,
    argv: &[&str],
    timeout: Duration,
) -> StepResult {
    let (program, args) = match argv.split_first() {
        Some((program, args)) => (*program, args),
        None => return nothing_to_do(step, "empty command"),
    };
    let spec = CommandSpec::new(program, args.iter().copied(), timeout).in_dir(path);

    let (success, detail) = match runner.run(&spec).await {
        Ok(out) if out.success() => (true, spec.display()),
        Ok(out) => (false, first_line(&out.stderr).unwrap_or("non-zero exit").to_string()),
        Err(e) => (false, e.to_string()),
    };

    if success {
        tracing::info!(path = %path.display(), %step, "setup step done");
    } else {
        tracing::warn!(path = %path.display(), %step, %detail, "setup step failed");
    }
    StepResult {
        step,
        success,
        detail,
    }
}

fn nothing_to_do(step: SetupStep, why: &str) -> StepResult {
    StepResult {
        step,
        success: true,
        detail: why.to_string(),
    }
}

fn first_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|l| !l.is_empty())
}
