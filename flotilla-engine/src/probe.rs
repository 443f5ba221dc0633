//! Local version-control queries against a single checkout.
//!
//! Read-only probes fail open: a broken `git status` reports clean and a
//! broken `rev-list` reports `(0, 0)`. Only `fetch` and `pull` surface errors,
//! and a timeout stays distinguishable from an ordinary failure.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::process::{CommandRunner, CommandSpec, ProcessRunner};

/// Deadline for local, read-only git queries.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracking reference used for ahead/behind everywhere.
pub const UPSTREAM_REF: &str = "@{upstream}";

#[async_trait]
pub trait VcsProbe: Send + Sync {
    /// True iff the working tree has any modified, staged or untracked file.
    async fn is_dirty(&self, path: &Path) -> bool;

    /// Porcelain status lines; empty on failure.
    async fn status_lines(&self, path: &Path) -> Vec<String>;

    /// Checked-out branch name, `None` on failure.
    async fn current_branch(&self, path: &Path) -> Option<String>;

    /// Commits `(ahead, behind)` of the tracking branch; `(0, 0)` on failure.
    async fn ahead_behind(&self, path: &Path) -> (u32, u32);

    /// `Ok(false)` on a non-zero exit.
    async fn fetch(&self, path: &Path, timeout: Duration) -> Result<bool, ProbeError>;

    /// Fast-forward-only pull. `Ok(false)` when history has diverged.
    async fn pull_fast_forward(&self, path: &Path, timeout: Duration) -> Result<bool, ProbeError>;
}

/// [`VcsProbe`] backed by the `git` executable.
#[derive(Clone)]
pub struct GitProbe {
    runner: Arc<dyn CommandRunner>,
}

impl Default for GitProbe {
    fn default() -> Self {
        Self::new(Arc::new(ProcessRunner))
    }
}

impl GitProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn git(path: &Path, args: &[&str], timeout: Duration) -> CommandSpec {
        CommandSpec::new("git", args.iter().copied(), timeout).in_dir(path)
    }

    /// stdout of a successful read-only query; `None` on any failure.
    async fn query(&self, path: &Path, args: &[&str]) -> Option<String> {
        let spec = Self::git(path, args, PROBE_TIMEOUT);
        match self.runner.run(&spec).await {
            Ok(out) if out.success() => Some(out.stdout),
            Ok(out) => {
                tracing::debug!(command = %spec.display(), code = ?out.code, "git query failed");
                None
            }
            Err(e) => {
                tracing::debug!(command = %spec.display(), error = %e, "git query failed");
                None
            }
        }
    }

    async fn mutate(&self, path: &Path, args: &[&str], timeout: Duration) -> Result<bool, ProbeError> {
        let spec = Self::git(path, args, timeout);
        let out = self.runner.run(&spec).await?;
        if !out.success() {
            tracing::info!(
                command = %spec.display(),
                path = %path.display(),
                stderr = %out.stderr.trim(),
                "git command failed"
            );
        }
        Ok(out.success())
    }
}

#[async_trait]
impl VcsProbe for GitProbe {
    async fn is_dirty(&self, path: &Path) -> bool {
        !self.status_lines(path).await.is_empty()
    }

    async fn status_lines(&self, path: &Path) -> Vec<String> {
        self.query(path, &["status", "--porcelain"])
            .await
            .map(|out| {
                out.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn current_branch(&self, path: &Path) -> Option<String> {
        self.query(path, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .map(|out| out.trim().to_string())
            .filter(|b| !b.is_empty())
    }

    async fn ahead_behind(&self, path: &Path) -> (u32, u32) {
        let range = format!("HEAD...{UPSTREAM_REF}");
        self.query(path, &["rev-list", "--left-right", "--count", range.as_str()])
            .await
            .and_then(|out| parse_ahead_behind(&out))
            .unwrap_or((0, 0))
    }

    async fn fetch(&self, path: &Path, timeout: Duration) -> Result<bool, ProbeError> {
        self.mutate(path, &["fetch", "--prune"], timeout).await
    }

    async fn pull_fast_forward(&self, path: &Path, timeout: Duration) -> Result<bool, ProbeError> {
        self.mutate(path, &["pull", "--ff-only"], timeout).await
    }
}

/// Two whitespace-separated integers, e.g. `"2\t5\n"`.
fn parse_ahead_behind(out: &str) -> Option<(u32, u32)> {
    let mut parts = out.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((ahead, behind))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;
    use crate::error::ProcessError;
    use crate::process::CommandOutput;

    /// Replies by subcommand; records every invocation.
    struct Scripted {
        reply: fn(&CommandSpec) -> Result<CommandOutput, ProcessError>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for Scripted {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
            self.calls.lock().unwrap().push(spec.display());
            (self.reply)(spec)
        }
    }

    fn probe(reply: fn(&CommandSpec) -> Result<CommandOutput, ProcessError>) -> (GitProbe, Arc<Scripted>) {
        let runner = Arc::new(Scripted {
            reply,
            calls: Mutex::new(Vec::new()),
        });
        (GitProbe::new(runner.clone()), runner)
    }

    #[rstest]
    #[case("2\t5\n", Some((2, 5)))]
    #[case("0 0", Some((0, 0)))]
    #[case("", None)]
    #[case("x 1", None)]
    #[case("1 2 3", None)]
    fn parses_rev_list_counts(#[case] out: &str, #[case] expected: Option<(u32, u32)>) {
        assert_eq!(parse_ahead_behind(out), expected);
    }

    #[tokio::test]
    async fn dirty_when_any_status_line() {
        let (p, runner) = probe(|_| Ok(CommandOutput::ok(" M src/lib.rs\n?? notes.txt\n")));
        assert!(p.is_dirty(Path::new("/ws/api")).await);
        assert_eq!(runner.calls.lock().unwrap()[0], "git status --porcelain");
    }

    #[tokio::test]
    async fn status_failure_fails_open() {
        let (p, _) = probe(|_| Err(ProcessError::NotFound { program: "git".into() }));
        assert!(!p.is_dirty(Path::new("/ws/api")).await);
        assert_eq!(p.ahead_behind(Path::new("/ws/api")).await, (0, 0));
        assert_eq!(p.current_branch(Path::new("/ws/api")).await, None);
    }

    #[tokio::test]
    async fn ahead_behind_uses_upstream() {
        let (p, runner) = probe(|_| Ok(CommandOutput::ok("1\t3\n")));
        assert_eq!(p.ahead_behind(Path::new("/ws/api")).await, (1, 3));
        assert_eq!(
            runner.calls.lock().unwrap()[0],
            "git rev-list --left-right --count HEAD...@{upstream}"
        );
    }

    #[tokio::test]
    async fn fetch_reports_exit_code_and_timeout_distinctly() {
        let (p, _) = probe(|_| Ok(CommandOutput::failed(128, "fatal: no remote")));
        assert!(!p.fetch(Path::new("/ws/api"), PROBE_TIMEOUT).await.unwrap());

        let (p, _) = probe(|spec| {
            Err(ProcessError::TimedOut {
                program: spec.program.clone(),
                after: spec.timeout,
            })
        });
        let err = p.fetch(Path::new("/ws/api"), PROBE_TIMEOUT).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
