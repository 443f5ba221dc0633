//! Optional progress side channel for interactive reporting.

use std::sync::Arc;

/// Receives `(repository, status)` updates from running tasks.
///
/// Implementations must return promptly and must not panic. Nothing depends
/// on a report being delivered, in order, or at all.
pub trait ProgressSink: Send + Sync {
    fn report(&self, repo: &str, status: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn report(&self, repo: &str, status: &str) {
        self(repo, status)
    }
}

pub type SharedProgress = Option<Arc<dyn ProgressSink>>;

pub(crate) fn emit(progress: &SharedProgress, repo: &str, status: &str) {
    if let Some(sink) = progress {
        sink.report(repo, status);
    }
}
