//! Concurrency-bounded fan-out of independent per-repository tasks.
//!
//! # Model
//!
//! ```text
//! jobs ──spawn all──▶ [task 1] [task 2] ... [task N]
//!                        │ acquire permit (K total)
//!                        │ timeout(body)  (clock starts after admission)
//!                        ▼
//!                     outcome  ◀── Err / timeout / panic mapped by `DispatchOutcome`
//! ```
//!
//! Every job yields exactly one outcome. Results come back in input order;
//! completion order is unconstrained. A failing, timed-out or panicking job
//! never affects its siblings, and the only shared state between tasks is the
//! admission gate.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::EngineError;
use crate::outcome::TaskOutcome;

/// Why a job produced no outcome of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The body returned `Err`.
    Error(String),
    TimedOut(Duration),
    Panicked(String),
    GateClosed,
}

impl Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Error(msg) => f.write_str(msg),
            TaskFailure::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
            TaskFailure::Panicked(msg) => write!(f, "task panicked: {msg}"),
            TaskFailure::GateClosed => f.write_str("admission gate closed"),
        }
    }
}

/// Outcome types the dispatcher can synthesize for failed jobs.
pub trait DispatchOutcome: Send + 'static {
    fn from_failure(name: &str, failure: TaskFailure) -> Self;
}

impl DispatchOutcome for TaskOutcome {
    fn from_failure(name: &str, failure: TaskFailure) -> Self {
        TaskOutcome::failed(name, failure.to_string())
    }
}

/// A named unit of work.
pub struct Job<F> {
    pub name: String,
    pub fut: F,
}

impl<F> Job<F> {
    pub fn new(name: impl Into<String>, fut: F) -> Self {
        Self {
            name: name.into(),
            fut,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    gate: Arc<Semaphore>,
    limit: usize,
    task_timeout: Option<Duration>,
}

impl Dispatcher {
    /// A dispatcher running at most `limit` jobs at once.
    pub fn new(limit: usize) -> Result<Self, EngineError> {
        if limit == 0 {
            return Err(EngineError::ZeroParallelism);
        }
        Ok(Self {
            gate: Arc::new(Semaphore::new(limit)),
            limit,
            task_timeout: None,
        })
    }

    /// Per-job deadline, measured from admission through the gate.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every job and return one outcome per job, in input order.
    pub async fn run<T, E, F>(&self, jobs: impl IntoIterator<Item = Job<F>>) -> Vec<T>
    where
        T: DispatchOutcome,
        E: Display + Send + 'static,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let gate = Arc::clone(&self.gate);
                let deadline = self.task_timeout;
                let name = job.name.clone();
                let handle = tokio::spawn(admit_and_run(gate, deadline, job));
                (name, handle)
            })
            .collect();

        tracing::debug!(jobs = handles.len(), limit = self.limit, "dispatched batch");

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                tracing::error!(repo = %name, error = %e, "task aborted");
                T::from_failure(&name, TaskFailure::Panicked(e.to_string()))
            });
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn admit_and_run<T, E, F>(gate: Arc<Semaphore>, deadline: Option<Duration>, job: Job<F>) -> T
where
    T: DispatchOutcome,
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let Job { name, fut } = job;

    // Released on every exit path, including unwinding.
    let _permit = match gate.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return T::from_failure(&name, TaskFailure::GateClosed),
    };

    let result = match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(repo = %name, timeout_secs = limit.as_secs(), "task timed out");
                return T::from_failure(&name, TaskFailure::TimedOut(limit));
            }
        },
        None => fut.await,
    };

    result.unwrap_or_else(|e| {
        tracing::warn!(repo = %name, error = %e, "task failed");
        T::from_failure(&name, TaskFailure::Error(e.to_string()))
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;
    use crate::outcome::Action;

    /// Tracks how many bodies are running and the highest value observed.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(matches!(
            Dispatcher::new(0).unwrap_err(),
            EngineError::ZeroParallelism
        ));
    }

    #[rstest]
    #[case(1, 5)]
    #[case(2, 6)]
    #[case(4, 16)]
    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn never_exceeds_limit(#[case] limit: usize, #[case] n: usize) {
        let gauge = Arc::new(Gauge::default());
        let jobs = (0..n).map(|i| {
            let gauge = Arc::clone(&gauge);
            Job::new(format!("repo-{i}"), async move {
                gauge.enter();
                tokio::time::sleep(Duration::from_millis(10 + i as u64)).await;
                gauge.exit();
                Ok::<_, Infallible>(TaskOutcome::fetched(format!("repo-{i}"), 0, 0))
            })
        });

        let outcomes = Dispatcher::new(limit).unwrap().run(jobs).await;

        assert_eq!(outcomes.len(), n);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), limit);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn failures_and_panics_still_yield_one_outcome_each() {
        let jobs = (0..6).map(|i| {
            Job::new(format!("repo-{i}"), async move {
                match i % 3 {
                    0 => Ok(TaskOutcome::fetched(format!("repo-{i}"), 0, 0)),
                    1 => Err(format!("exit status {i}")),
                    _ => panic!("boom {i}"),
                }
            })
        });

        let outcomes = Dispatcher::new(2).unwrap().run(jobs).await;

        assert_eq!(outcomes.len(), 6);
        let names: Vec<_> = outcomes.iter().map(|o| o.name().to_string()).collect();
        let expected: Vec<_> = (0..6).map(|i| format!("repo-{i}")).collect();
        assert_eq!(names, expected, "outcomes follow input order");

        assert!(outcomes[0].success());
        assert_eq!(outcomes[1].action(), Action::Failed);
        assert_eq!(outcomes[1].message(), "exit status 1");
        assert_eq!(outcomes[2].action(), Action::Failed);
        assert!(outcomes[2].message().contains("panicked"));
        assert!(outcomes[3].success());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn timeout_is_per_task() {
        let jobs = [("slow", 30u64), ("fast", 1), ("medium", 2)].map(|(name, secs)| {
            Job::new(name, async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                Ok::<_, Infallible>(TaskOutcome::fetched(name, 0, 0))
            })
        });

        let outcomes = Dispatcher::new(1)
            .unwrap()
            .with_task_timeout(Duration::from_secs(5))
            .run(jobs)
            .await;

        assert_eq!(outcomes[0].action(), Action::Failed);
        assert_eq!(outcomes[0].message(), "timed out after 5s");
        // Queued behind the slow job, yet each gets its own full deadline.
        assert!(outcomes[1].success());
        assert!(outcomes[2].success());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn empty_batch_returns_empty() {
        let jobs: Vec<Job<std::future::Ready<Result<TaskOutcome, Infallible>>>> = Vec::new();
        let outcomes = Dispatcher::new(3).unwrap().run(jobs).await;
        assert!(outcomes.is_empty());
    }
}
