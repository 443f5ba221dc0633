//! Hosting-service client backed by the `gh` executable.
//!
//! | operation       | retry | failure contract                         |
//! |-----------------|-------|------------------------------------------|
//! | `check_auth`    | no    | absent tool or timeout ⇒ `false`         |
//! | `clone_repo`    | yes   | error propagates after the last attempt  |
//! | `get_pr_count`  | yes   | degrades to `0`                          |
//! | `get_ci_status` | yes   | degrades to `None`                       |

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use flotilla_core::RemoteId;

use crate::error::RemoteError;
use crate::process::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use crate::retry::RetryPolicy;

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on a single `gh repo clone` attempt.
pub const CLONE_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(600);
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

const PR_LIMIT: &str = "50";
const RUN_LIMIT: &str = "5";

/// Latest CI run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    Passing,
    Failing,
    Pending,
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiStatus::Passing => write!(f, "passing"),
            CiStatus::Failing => write!(f, "failing"),
            CiStatus::Pending => write!(f, "pending"),
        }
    }
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn check_auth(&self) -> bool;

    /// Clone `remote` into `target`. Errors surface only after retries are spent.
    async fn clone_repo(&self, remote: &RemoteId, target: &Path) -> Result<(), RemoteError>;

    /// Open pull requests; `0` when unknown.
    async fn get_pr_count(&self, remote: &RemoteId) -> u32;

    /// Latest CI run; `None` when unknown.
    async fn get_ci_status(&self, remote: &RemoteId) -> Option<CiStatus>;
}

/// [`RemoteClient`] driving the GitHub CLI.
#[derive(Clone)]
pub struct GhClient {
    runner: Arc<dyn CommandRunner>,
    retry: RetryPolicy,
}

impl Default for GhClient {
    fn default() -> Self {
        Self::new(Arc::new(ProcessRunner), RetryPolicy::default())
    }
}

impl GhClient {
    pub fn new(runner: Arc<dyn CommandRunner>, retry: RetryPolicy) -> Self {
        Self { runner, retry }
    }

    /// Retry-wrapped `gh` invocation. Non-zero exits are returned as output,
    /// not as errors; only process-level failures are retried here.
    async fn query(&self, operation: &str, args: Vec<String>) -> Result<CommandOutput, RemoteError> {
        let spec = &CommandSpec::new("gh", args, QUERY_TIMEOUT);
        let runner = &self.runner;
        self.retry
            .run(operation, || async move { runner.run(spec).await.map_err(RemoteError::from) })
            .await
    }
}

#[async_trait]
impl RemoteClient for GhClient {
    async fn check_auth(&self) -> bool {
        let spec = CommandSpec::new("gh", ["auth", "status"], AUTH_TIMEOUT);
        match self.runner.run(&spec).await {
            Ok(out) => out.success(),
            Err(e) => {
                tracing::debug!(error = %e, "gh auth check failed");
                false
            }
        }
    }

    async fn clone_repo(&self, remote: &RemoteId, target: &Path) -> Result<(), RemoteError> {
        let target_str = target
            .to_str()
            .ok_or_else(|| RemoteError::InvalidInput(format!("non UTF-8 path {}", target.display())))?;
        let id = remote.to_string();
        let spec = &CommandSpec::new(
            "gh",
            ["repo", "clone", id.as_str(), target_str],
            CLONE_ATTEMPT_TIMEOUT,
        );
        let runner = &self.runner;
        // Only a directory this call created may be cleared between attempts.
        let fresh = !target.exists();
        tracing::info!(repo = %remote, target = %target.display(), "cloning");

        self.retry
            .run("clone", || async move {
                let result = match runner.run(spec).await {
                    Ok(out) if out.success() => Ok(()),
                    Ok(out) => {
                        let detail = out.stderr.trim().to_string();
                        tracing::error!(repo = %remote, error = %detail, "clone failed");
                        Err(RemoteError::Connection {
                            repo: remote.to_string(),
                            detail,
                        })
                    }
                    Err(e) => Err(RemoteError::from(e)),
                };
                if result.is_err() && fresh {
                    discard_partial(target).await;
                }
                result
            })
            .await
    }

    async fn get_pr_count(&self, remote: &RemoteId) -> u32 {
        let args = vec![
            "pr".into(),
            "list".into(),
            "--repo".into(),
            remote.to_string(),
            "--json".into(),
            "number,title,state,author".into(),
            "--limit".into(),
            PR_LIMIT.into(),
        ];
        match self.query("pr-count", args).await {
            Ok(out) if out.success() => parse_pr_count(&out.stdout).unwrap_or(0),
            Ok(_) => 0,
            Err(e) => {
                tracing::debug!(repo = %remote, error = %e, "pr count unavailable");
                0
            }
        }
    }

    async fn get_ci_status(&self, remote: &RemoteId) -> Option<CiStatus> {
        let args = vec![
            "run".into(),
            "list".into(),
            "--repo".into(),
            remote.to_string(),
            "--json".into(),
            "status,conclusion,name".into(),
            "--limit".into(),
            RUN_LIMIT.into(),
        ];
        match self.query("ci-status", args).await {
            Ok(out) if out.success() => parse_ci_status(&out.stdout),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(repo = %remote, error = %e, "ci status unavailable");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON parsing
// ---------------------------------------------------------------------------

fn parse_pr_count(stdout: &str) -> Option<u32> {
    let prs: Vec<serde_json::Value> = serde_json::from_str(stdout).ok()?;
    u32::try_from(prs.len()).ok()
}

/// `gh repo clone` refuses a non-empty target, so a failed attempt's leftovers
/// would fail every retry.
async fn discard_partial(target: &Path) {
    if tokio::fs::try_exists(target).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_dir_all(target).await {
            tracing::warn!(path = %target.display(), error = %e, "could not remove partial clone");
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunSummary {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
}

/// Newest run first, as `gh run list` orders them.
fn parse_ci_status(stdout: &str) -> Option<CiStatus> {
    let runs: Vec<RunSummary> = serde_json::from_str(stdout).ok()?;
    let latest = runs.first()?;
    if latest.status.as_deref() == Some("completed") {
        if latest.conclusion.as_deref() == Some("success") {
            Some(CiStatus::Passing)
        } else {
            Some(CiStatus::Failing)
        }
    } else {
        Some(CiStatus::Pending)
    }
}
