//! Fetch and optionally fast-forward a set of checkouts.
//!
//! Per repository:
//!
//! ```text
//! dirty && !force ──▶ skipped (success)
//! fetch ── timeout ──▶ failed "Fetch timed out after Ns"
//!       ── non-zero ─▶ failed "Fetch failed"
//! ahead/behind
//! pull && behind > 0 ── ff ok ──▶ pulled
//!                    ── else ───▶ failed
//! otherwise ──▶ fetched
//! ```

use std::collections::HashSet;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flotilla_core::RepositoryDescriptor;

use crate::dispatcher::{Dispatcher, Job};
use crate::error::EngineError;
use crate::outcome::{Action, TaskOutcome};
use crate::probe::{VcsProbe, PROBE_TIMEOUT};
use crate::progress::{emit, SharedProgress};

pub const DIRTY_MESSAGE: &str = "Working tree has uncommitted changes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub pull: bool,
    pub force: bool,
    pub parallel: usize,
    /// Deadline for each fetch and each pull.
    pub timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pull: false,
            force: false,
            parallel: 4,
            timeout: Duration::from_secs(120),
        }
    }
}

impl SyncOptions {
    /// Whole-task backstop: fetch and pull deadlines plus the local probes.
    pub fn task_deadline(&self) -> Duration {
        self.timeout * 2 + PROBE_TIMEOUT * 4
    }
}

/// A checkout to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub name: String,
    pub path: PathBuf,
}

impl SyncTarget {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// `None` unless the descriptor is present on disk.
    pub fn from_descriptor(repo: &RepositoryDescriptor) -> Option<Self> {
        repo.checkout().map(|path| Self::new(repo.name.as_str(), path))
    }
}

/// Sync every target, returning one outcome per target in input order.
pub async fn sync_all(
    probe: Arc<dyn VcsProbe>,
    targets: Vec<SyncTarget>,
    options: &SyncOptions,
    progress: SharedProgress,
) -> Result<Vec<TaskOutcome>, EngineError> {
    let mut seen = HashSet::new();
    if let Some(dup) = targets.iter().find(|t| !seen.insert(t.name.as_str())) {
        return Err(EngineError::DuplicateRepository(dup.name.clone()));
    }

    let dispatcher = Dispatcher::new(options.parallel)?.with_task_timeout(options.task_deadline());

    tracing::info!(
        repos = targets.len(),
        pull = options.pull,
        force = options.force,
        parallel = options.parallel,
        "starting sync batch"
    );

    let jobs = targets.into_iter().map(|target| {
        let probe = Arc::clone(&probe);
        let options = options.clone();
        let progress = progress.clone();
        Job::new(target.name.clone(), async move {
            Ok::<_, Infallible>(sync_one(probe.as_ref(), target, &options, &progress).await)
        })
    });

    Ok(dispatcher.run(jobs).await)
}

async fn sync_one(
    probe: &dyn VcsProbe,
    target: SyncTarget,
    options: &SyncOptions,
    progress: &SharedProgress,
) -> TaskOutcome {
    let SyncTarget { name, path } = target;
    emit(progress, &name, "syncing...");

    if !options.force && probe.is_dirty(&path).await {
        tracing::info!(repo = %name, "skipping dirty working tree");
        emit(progress, &name, "skipped (dirty)");
        return TaskOutcome::skipped(name, DIRTY_MESSAGE);
    }

    let secs = options.timeout.as_secs();
    match probe.fetch(&path, options.timeout).await {
        Ok(true) => {}
        Ok(false) => return failed(progress, name, "Fetch failed".to_string()),
        Err(e) if e.is_timeout() => {
            return failed(progress, name, format!("Fetch timed out after {secs}s"))
        }
        Err(e) => return failed(progress, name, format!("Fetch failed: {e}")),
    }

    let (ahead, behind) = probe.ahead_behind(&path).await;

    let outcome = if options.pull && behind > 0 {
        match probe.pull_fast_forward(&path, options.timeout).await {
            Ok(true) => TaskOutcome::pulled(name, ahead, behind),
            Ok(false) => {
                return failed(
                    progress,
                    name,
                    "Fast-forward pull failed; local branch has diverged".to_string(),
                )
            }
            Err(e) if e.is_timeout() => {
                return failed(progress, name, format!("Pull timed out after {secs}s"))
            }
            Err(e) => return failed(progress, name, format!("Pull failed: {e}")),
        }
    } else {
        TaskOutcome::fetched(name, ahead, behind)
    };

    tracing::info!(
        repo = %outcome.name(),
        action = %outcome.action(),
        ahead,
        behind,
        "synced"
    );
    emit(progress, outcome.name(), &format!("✓ {}", outcome.action()));
    outcome
}

fn failed(progress: &SharedProgress, name: String, message: String) -> TaskOutcome {
    tracing::warn!(repo = %name, %message, "sync failed");
    emit(progress, &name, &format!("✗ {}", Action::Failed));
    TaskOutcome::failed(name, message)
}
