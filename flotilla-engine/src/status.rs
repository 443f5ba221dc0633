//! Per-repository status for the dashboard, optionally enriched with
//! hosting-service data gathered concurrently.

use std::sync::Arc;

use serde::Serialize;

use flotilla_core::RepositoryDescriptor;

use crate::dispatcher::{DispatchOutcome, Dispatcher, Job, TaskFailure};
use crate::error::EngineError;
use crate::probe::VcsProbe;
use crate::remote::{CiStatus, RemoteClient};

pub const DEFAULT_BRANCH: &str = "main";

/// Local state of one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoInfo {
    pub name: String,
    pub present: bool,
    pub branch: Option<String>,
    pub default_branch: String,
    pub dirty: bool,
    pub uncommitted: Vec<String>,
    pub ahead: u32,
    pub behind: u32,
}

impl RepoInfo {
    fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            present: false,
            branch: None,
            default_branch: DEFAULT_BRANCH.to_string(),
            dirty: false,
            uncommitted: Vec::new(),
            ahead: 0,
            behind: 0,
        }
    }

    pub fn is_on_default(&self) -> bool {
        self.branch.as_deref() == Some(self.default_branch.as_str())
    }

    /// Dirty or off the default branch.
    pub fn needs_attention(&self) -> bool {
        self.present && (self.dirty || !self.is_on_default())
    }
}

/// Gather branch, dirty state and ahead/behind for one descriptor.
pub async fn repo_info(probe: &dyn VcsProbe, repo: &RepositoryDescriptor) -> RepoInfo {
    let mut info = RepoInfo::absent(repo.name.as_str());
    let Some(path) = repo.checkout() else {
        return info;
    };
    info.present = true;
    info.branch = probe.current_branch(path).await;
    info.uncommitted = probe.status_lines(path).await;
    info.dirty = !info.uncommitted.is_empty();
    let (ahead, behind) = probe.ahead_behind(path).await;
    info.ahead = ahead;
    info.behind = behind;
    info
}

/// [`RepoInfo`] plus hosting-service telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoHealth {
    #[serde(flatten)]
    pub info: RepoInfo,
    pub open_prs: Option<u32>,
    pub ci: Option<CiStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome for RepoHealth {
    fn from_failure(name: &str, failure: TaskFailure) -> Self {
        Self {
            info: RepoInfo::absent(name),
            open_prs: None,
            ci: None,
            error: Some(failure.to_string()),
        }
    }
}

/// Status for every descriptor, in input order.
///
/// With a remote client, each present repository also gets its open PR count
/// and latest CI status; those reads degrade to unknown on failure.
pub async fn collect_health(
    probe: Arc<dyn VcsProbe>,
    remote: Option<Arc<dyn RemoteClient>>,
    repos: &[RepositoryDescriptor],
    parallel: usize,
) -> Result<Vec<RepoHealth>, EngineError> {
    let dispatcher = Dispatcher::new(parallel)?;

    let jobs = repos.iter().map(|repo| {
        let probe = Arc::clone(&probe);
        let remote = remote.clone();
        let repo = repo.clone();
        Job::new(repo.name.to_string(), async move {
            let info = repo_info(probe.as_ref(), &repo).await;
            let mut health = RepoHealth {
                info,
                open_prs: None,
                ci: None,
                error: None,
            };
            if let (Some(remote), true) = (remote, repo.is_present()) {
                let id = repo.remote_id()?;
                let (prs, ci) = tokio::join!(remote.get_pr_count(&id), remote.get_ci_status(&id));
                health.open_prs = Some(prs);
                health.ci = ci;
            }
            Ok::<_, EngineError>(health)
        })
    });

    Ok(dispatcher.run(jobs).await)
}
