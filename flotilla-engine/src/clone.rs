//! Populate a workspace from a repository registry.
//!
//! Existing targets are skipped without contacting the remote, so re-running
//! on a populated workspace is a no-op per repository. Clone failures become
//! `failed` outcomes; only malformed input is returned as an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flotilla_core::{registry, RemoteId, RepositoryDescriptor};

use crate::dispatcher::{Dispatcher, Job};
use crate::error::{io_err, EngineError, RemoteError};
use crate::outcome::TaskOutcome;
use crate::progress::{emit, SharedProgress};
use crate::remote::{RemoteClient, CLONE_ATTEMPT_TIMEOUT};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOptions {
    /// Concurrency ceiling.
    pub parallel: usize,
    /// Per-repository deadline, retries included.
    pub timeout: Duration,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            parallel: 4,
            timeout: RetryPolicy::default().worst_case(CLONE_ATTEMPT_TIMEOUT),
        }
    }
}

/// Clone every descriptor under `root`, returning one outcome per descriptor
/// in input order.
pub async fn clone_all(
    remote: Arc<dyn RemoteClient>,
    repos: &[RepositoryDescriptor],
    root: &Path,
    options: &CloneOptions,
    progress: SharedProgress,
) -> Result<Vec<TaskOutcome>, EngineError> {
    registry::validate(repos)?;
    let dispatcher = Dispatcher::new(options.parallel)?.with_task_timeout(options.timeout);
    std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

    let mut slots: Vec<Option<TaskOutcome>> = vec![None; repos.len()];
    let mut pending = Vec::new();
    let mut jobs = Vec::new();

    for (idx, repo) in repos.iter().enumerate() {
        let name = repo.name.to_string();
        let target = root.join(repo.name.as_str());
        if target.exists() {
            emit(&progress, &name, "already exists, skipping");
            slots[idx] = Some(TaskOutcome::skipped(name, "already exists"));
            continue;
        }
        let remote_id = repo.remote_id()?;
        pending.push(idx);
        jobs.push(Job::new(
            name.clone(),
            clone_one(Arc::clone(&remote), name, remote_id, target, progress.clone()),
        ));
    }

    tracing::info!(
        total = repos.len(),
        to_clone = jobs.len(),
        parallel = options.parallel,
        "starting clone batch"
    );

    let dispatched = dispatcher.run(jobs).await;
    for (idx, outcome) in pending.into_iter().zip(dispatched) {
        slots[idx] = Some(outcome);
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Name → success view of [`clone_all`].
pub async fn clone_repos(
    remote: Arc<dyn RemoteClient>,
    repos: &[RepositoryDescriptor],
    root: &Path,
    options: &CloneOptions,
    progress: SharedProgress,
) -> Result<BTreeMap<String, bool>, EngineError> {
    let outcomes = clone_all(remote, repos, root, options, progress).await?;
    Ok(outcomes
        .into_iter()
        .map(|o| (o.name().to_string(), o.success()))
        .collect())
}

async fn clone_one(
    remote: Arc<dyn RemoteClient>,
    name: String,
    remote_id: RemoteId,
    target: PathBuf,
    progress: SharedProgress,
) -> Result<TaskOutcome, RemoteError> {
    emit(&progress, &name, "cloning...");
    let mut partial = PartialCheckout::new(target.clone());
    match remote.clone_repo(&remote_id, &target).await {
        Ok(()) => {
            partial.keep();
            emit(&progress, &name, "✓ cloned");
            Ok(TaskOutcome::cloned(
                name,
                format!("cloned into {}", target.display()),
            ))
        }
        Err(e) => {
            tracing::error!(repo = %name, error = %e, "clone failed");
            emit(&progress, &name, &format!("✗ failed: {e}"));
            Err(e)
        }
    }
}

/// Removes the clone target on drop unless [`keep`](Self::keep) was called.
/// Runs on error and when the task deadline cancels the clone.
struct PartialCheckout {
    path: PathBuf,
    keep: bool,
}

impl PartialCheckout {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialCheckout {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed partial clone"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove partial clone")
            }
        }
    }
}
