//! Sync orchestration against a scripted version-control probe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flotilla_engine::{
    sync_all, Action, EngineError, ProbeError, ProcessError, SyncOptions, SyncTarget, VcsProbe,
};

/// How a scripted checkout responds.
#[derive(Clone, Copy)]
struct Script {
    dirty: bool,
    fetch: Fetch,
    counts: (u32, u32),
    pull_ok: bool,
}

#[derive(Clone, Copy)]
enum Fetch {
    Ok,
    NonZero,
    Hang,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            dirty: false,
            fetch: Fetch::Ok,
            counts: (0, 0),
            pull_ok: true,
        }
    }
}

#[derive(Default)]
struct FakeGit {
    scripts: HashMap<PathBuf, Script>,
    fetches: AtomicUsize,
    pulls: AtomicUsize,
    rev_lists: AtomicUsize,
}

impl FakeGit {
    fn with(mut self, path: &str, script: Script) -> Self {
        self.scripts.insert(PathBuf::from(path), script);
        self
    }

    fn script(&self, path: &Path) -> Script {
        self.scripts.get(path).copied().unwrap_or_default()
    }
}

#[async_trait]
impl VcsProbe for FakeGit {
    async fn is_dirty(&self, path: &Path) -> bool {
        self.script(path).dirty
    }

    async fn status_lines(&self, path: &Path) -> Vec<String> {
        if self.script(path).dirty {
            vec![" M src/main.py".into()]
        } else {
            Vec::new()
        }
    }

    async fn current_branch(&self, _: &Path) -> Option<String> {
        Some("main".into())
    }

    async fn ahead_behind(&self, path: &Path) -> (u32, u32) {
        self.rev_lists.fetch_add(1, Ordering::SeqCst);
        self.script(path).counts
    }

    async fn fetch(&self, path: &Path, timeout: Duration) -> Result<bool, ProbeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.script(path).fetch {
            Fetch::Ok => Ok(true),
            Fetch::NonZero => Ok(false),
            Fetch::Hang => {
                tokio::time::sleep(timeout).await;
                Err(ProbeError::Process(ProcessError::TimedOut {
                    program: "git".into(),
                    after: timeout,
                }))
            }
        }
    }

    async fn pull_fast_forward(&self, path: &Path, _: Duration) -> Result<bool, ProbeError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script(path).pull_ok)
    }
}

fn target(name: &str) -> SyncTarget {
    SyncTarget::new(name, format!("/ws/{name}"))
}

fn opts(pull: bool, force: bool) -> SyncOptions {
    SyncOptions {
        pull,
        force,
        parallel: 2,
        timeout: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn dirty_repo_is_skipped_without_fetching() {
    let git = Arc::new(FakeGit::default().with(
        "/ws/X",
        Script {
            dirty: true,
            ..Script::default()
        },
    ));

    let outcomes = sync_all(git.clone(), vec![target("X")], &opts(true, false), None)
        .await
        .expect("sync");

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].name(), "X");
    assert_eq!(outcomes[0].action(), Action::Skipped);
    assert!(outcomes[0].success());
    assert_eq!(outcomes[0].message(), "Working tree has uncommitted changes");
    assert_eq!(git.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn force_syncs_dirty_repo() {
    let git = Arc::new(FakeGit::default().with(
        "/ws/X",
        Script {
            dirty: true,
            ..Script::default()
        },
    ));

    let outcomes = sync_all(git.clone(), vec![target("X")], &opts(false, true), None)
        .await
        .expect("sync");

    assert_eq!(outcomes[0].action(), Action::Fetched);
    assert_eq!(git.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn behind_pulls_only_when_asked() {
    let behind = Script {
        counts: (0, 3),
        ..Script::default()
    };

    let git = Arc::new(FakeGit::default().with("/ws/api", behind));
    let pulled = sync_all(git.clone(), vec![target("api")], &opts(true, false), None)
        .await
        .expect("sync");
    assert_eq!(pulled[0].action(), Action::Pulled);
    assert_eq!(pulled[0].behind(), 3);
    assert_eq!(git.pulls.load(Ordering::SeqCst), 1);

    let git = Arc::new(FakeGit::default().with("/ws/api", behind));
    let fetched = sync_all(git.clone(), vec![target("api")], &opts(false, false), None)
        .await
        .expect("sync");
    assert_eq!(fetched[0].action(), Action::Fetched);
    assert_eq!(fetched[0].behind(), 3);
    assert_eq!(git.pulls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn up_to_date_repo_is_not_pulled() {
    let git = Arc::new(FakeGit::default());
    let outcomes = sync_all(git.clone(), vec![target("api")], &opts(true, false), None)
        .await
        .expect("sync");
    assert_eq!(outcomes[0].action(), Action::Fetched);
    assert_eq!(git.pulls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn fetch_failure_leaves_counts_at_zero() {
    let git = Arc::new(FakeGit::default().with(
        "/ws/api",
        Script {
            fetch: Fetch::NonZero,
            counts: (4, 9),
            ..Script::default()
        },
    ));

    let outcomes = sync_all(git.clone(), vec![target("api")], &opts(true, false), None)
        .await
        .expect("sync");

    let o = &outcomes[0];
    assert_eq!(o.action(), Action::Failed);
    assert!(!o.success());
    assert_eq!(o.message(), "Fetch failed");
    assert_eq!((o.ahead(), o.behind()), (0, 0));
    assert_eq!(git.rev_lists.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn fetch_timeout_is_reported_as_timeout() {
    let git = Arc::new(FakeGit::default().with(
        "/ws/slow",
        Script {
            fetch: Fetch::Hang,
            ..Script::default()
        },
    ));

    let outcomes = sync_all(
        git,
        vec![target("slow"), target("quick")],
        &opts(false, false),
        None,
    )
    .await
    .expect("sync");

    assert_eq!(outcomes[0].action(), Action::Failed);
    assert_eq!(outcomes[0].message(), "Fetch timed out after 30s");
    assert_eq!(outcomes[1].action(), Action::Fetched);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn diverged_pull_is_a_failure() {
    let git = Arc::new(FakeGit::default().with(
        "/ws/api",
        Script {
            counts: (2, 1),
            pull_ok: false,
            ..Script::default()
        },
    ));

    let outcomes = sync_all(git, vec![target("api")], &opts(true, false), None)
        .await
        .expect("sync");

    assert_eq!(outcomes[0].action(), Action::Failed);
    assert!(!outcomes[0].success());
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn mixed_batch_reports_every_repo() {
    let git = Arc::new(
        FakeGit::default()
            .with(
                "/ws/a",
                Script {
                    dirty: true,
                    ..Script::default()
                },
            )
            .with(
                "/ws/b",
                Script {
                    fetch: Fetch::NonZero,
                    ..Script::default()
                },
            )
            .with(
                "/ws/c",
                Script {
                    counts: (0, 2),
                    ..Script::default()
                },
            ),
    );
    let targets = ["a", "b", "c", "d"].map(target).to_vec();

    let outcomes = sync_all(git, targets, &opts(true, false), None)
        .await
        .expect("sync");

    let actions: Vec<_> = outcomes.iter().map(|o| o.action()).collect();
    assert_eq!(
        actions,
        [Action::Skipped, Action::Failed, Action::Pulled, Action::Fetched]
    );
}

#[tokio::test]
async fn duplicate_targets_are_rejected() {
    let err = sync_all(
        Arc::new(FakeGit::default()),
        vec![target("api"), target("api")],
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateRepository(ref n) if n == "api"));
}
