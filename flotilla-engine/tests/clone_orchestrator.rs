//! Clone orchestration against a fake hosting service.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flotilla_core::{RemoteId, RepoKind, RepositoryDescriptor, Tier};
use flotilla_engine::remote::CLONE_ATTEMPT_TIMEOUT;
use flotilla_engine::{
    clone_all, clone_repos, Action, CiStatus, CloneOptions, EngineError, RemoteClient, RemoteError,
    RetryPolicy,
};
use tempfile::TempDir;
use tokio::time::Instant;

/// Sleeps, then materialises a checkout. Repos named in `broken` fail.
struct FakeHost {
    delay: Duration,
    broken: Vec<&'static str>,
    clones: AtomicUsize,
}

impl FakeHost {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            broken: Vec::new(),
            clones: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteClient for FakeHost {
    async fn check_auth(&self) -> bool {
        true
    }

    async fn clone_repo(&self, remote: &RemoteId, target: &Path) -> Result<(), RemoteError> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.broken.iter().any(|b| *b == remote.name()) {
            return Err(RemoteError::Connection {
                repo: remote.to_string(),
                detail: "repository not found".into(),
            });
        }
        std::fs::create_dir_all(target.join(".git")).expect("fake checkout");
        Ok(())
    }

    async fn get_pr_count(&self, _: &RemoteId) -> u32 {
        0
    }

    async fn get_ci_status(&self, _: &RemoteId) -> Option<CiStatus> {
        None
    }
}

fn fleet(n: usize) -> Vec<RepositoryDescriptor> {
    (0..n)
        .map(|i| {
            RepositoryDescriptor::new(
                format!("svc-{i}"),
                Tier::P1,
                RepoKind::Python,
                format!("https://github.com/acme/svc-{i}.git"),
            )
        })
        .collect()
}

fn options(parallel: usize) -> CloneOptions {
    CloneOptions {
        parallel,
        ..CloneOptions::default()
    }
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn six_repos_two_at_a_time_take_three_rounds() {
    let ws = TempDir::new().expect("workspace");
    let host = Arc::new(FakeHost::new(Duration::from_millis(50)));
    let started = Instant::now();

    let results = clone_repos(host.clone(), &fleet(6), ws.path(), &options(2), None)
        .await
        .expect("clone");

    let elapsed = started.elapsed();
    assert_eq!(results.len(), 6);
    assert!(results.values().all(|ok| *ok));
    assert!(elapsed >= Duration::from_millis(150), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "ran serially: {elapsed:?}");
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn second_run_is_a_no_op() {
    let ws = TempDir::new().expect("workspace");
    let repos = fleet(4);

    let first = Arc::new(FakeHost::new(Duration::from_millis(5)));
    clone_all(first.clone(), &repos, ws.path(), &options(4), None)
        .await
        .expect("first");
    assert_eq!(first.clones.load(Ordering::SeqCst), 4);

    let second = Arc::new(FakeHost::new(Duration::from_millis(5)));
    let outcomes = clone_all(second.clone(), &repos, ws.path(), &options(4), None)
        .await
        .expect("second");

    assert_eq!(second.clones.load(Ordering::SeqCst), 0);
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes
        .iter()
        .all(|o| o.action() == Action::Skipped && o.success()));
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn one_failure_does_not_abort_the_batch() {
    let ws = TempDir::new().expect("workspace");
    let host = Arc::new(FakeHost {
        broken: vec!["svc-1"],
        ..FakeHost::new(Duration::from_millis(10))
    });
    let seen = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        move |repo: &str, status: &str| seen.lock().unwrap().push((repo.into(), status.into()))
    };

    let outcomes = clone_all(host, &fleet(3), ws.path(), &options(2), Some(Arc::new(sink)))
        .await
        .expect("clone");

    let names: Vec<_> = outcomes.iter().map(|o| o.name()).collect();
    assert_eq!(names, ["svc-0", "svc-1", "svc-2"]);
    assert!(outcomes[0].success());
    assert_eq!(outcomes[1].action(), Action::Failed);
    assert!(outcomes[1].message().contains("repository not found"));
    assert!(outcomes[2].success());
    assert!(!ws.path().join("svc-1").exists());

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|(r, s)| r == "svc-1" && s.starts_with("✗")));
    assert!(seen.iter().any(|(r, s)| r == "svc-0" && s == "✓ cloned"));
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn existing_directory_is_skipped_without_remote_call() {
    let ws = TempDir::new().expect("workspace");
    std::fs::create_dir_all(ws.path().join("svc-0")).expect("mkdir");
    let host = Arc::new(FakeHost::new(Duration::from_millis(1)));

    let outcomes = clone_all(host.clone(), &fleet(2), ws.path(), &options(1), None)
        .await
        .expect("clone");

    assert_eq!(outcomes[0].action(), Action::Skipped);
    assert_eq!(outcomes[0].message(), "already exists");
    assert_eq!(outcomes[1].action(), Action::Cloned);
    assert_eq!(host.clones.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn malformed_input_is_a_configuration_error() {
    let ws = TempDir::new().expect("workspace");
    let host = Arc::new(FakeHost::new(Duration::ZERO));

    let mut dupes = fleet(2);
    dupes.push(dupes[0].clone());
    let err = clone_all(host.clone(), &dupes, ws.path(), &options(2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Workspace(_)), "got: {err}");

    let bad = vec![RepositoryDescriptor::new("x", Tier::P0, RepoKind::Python, "ftp://nowhere")];
    assert!(clone_all(host.clone(), &bad, ws.path(), &options(2), None)
        .await
        .is_err());
    assert_eq!(host.clones.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn hung_clone_times_out_alone() {
    let ws = TempDir::new().expect("workspace");
    let host = Arc::new(FakeHost::new(Duration::from_secs(60)));
    let opts = CloneOptions {
        parallel: 2,
        timeout: Duration::from_secs(1),
    };

    let outcomes = clone_all(host, &fleet(2), ws.path(), &opts, None)
        .await
        .expect("clone");

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| !o.success()));
    assert!(outcomes[0].message().contains("timed out"));
}

/// Writes `.git` into the target, then never finishes.
struct Stalls;

#[async_trait]
impl RemoteClient for Stalls {
    async fn check_auth(&self) -> bool {
        true
    }

    async fn clone_repo(&self, _: &RemoteId, target: &Path) -> Result<(), RemoteError> {
        std::fs::create_dir_all(target.join(".git")).expect("partial checkout");
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn get_pr_count(&self, _: &RemoteId) -> u32 {
        0
    }

    async fn get_ci_status(&self, _: &RemoteId) -> Option<CiStatus> {
        None
    }
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn timed_out_clone_is_retried_on_next_run() {
    let ws = TempDir::new().expect("workspace");
    let repos = fleet(1);
    let opts = CloneOptions {
        parallel: 1,
        timeout: Duration::from_secs(1),
    };

    let first = clone_all(Arc::new(Stalls), &repos, ws.path(), &opts, None)
        .await
        .expect("first");
    assert_eq!(first[0].action(), Action::Failed);
    assert!(!ws.path().join("svc-0").exists());

    let host = Arc::new(FakeHost::new(Duration::ZERO));
    let second = clone_all(host.clone(), &repos, ws.path(), &opts, None)
        .await
        .expect("second");
    assert_eq!(second[0].action(), Action::Cloned);
    assert_eq!(host.clones.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn names_outside_the_workspace_are_a_configuration_error() {
    let ws = TempDir::new().expect("workspace");
    let elsewhere = TempDir::new().expect("outside dir");
    let host = Arc::new(FakeHost::new(Duration::ZERO));

    for name in [
        elsewhere.path().to_str().expect("utf-8 temp path").to_string(),
        String::new(),
        "../svc".to_string(),
    ] {
        let repos = vec![RepositoryDescriptor::new(
            name.clone(),
            Tier::P1,
            RepoKind::Python,
            "acme/svc",
        )];
        let err = clone_all(host.clone(), &repos, ws.path(), &options(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Workspace(_)), "{name:?}: {err}");
    }
    assert_eq!(host.clones.load(Ordering::SeqCst), 0);
    assert!(elsewhere.path().exists());
}

#[test]
fn default_deadline_outlasts_every_clone_attempt() {
    let budget = RetryPolicy::default().worst_case(CLONE_ATTEMPT_TIMEOUT);
    assert!(CloneOptions::default().timeout >= budget);
}
