//! Error types for flotilla-engine.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use flotilla_core::WorkspaceError;

use crate::retry::Retryable;

/// Failure to run an external program to completion.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program is not on `PATH`.
    #[error("{program} not found on PATH")]
    NotFound { program: String },

    /// Spawn or pipe failure.
    #[error("I/O error running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program overran its deadline and was killed.
    #[error("{program} timed out after {}s", after.as_secs())]
    TimedOut { program: String, after: Duration },
}

impl ProcessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::TimedOut { .. })
    }
}

/// Errors from the hosting-service client.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The hosting tool exited non-zero; treated as a connectivity failure.
    #[error("failed to clone {repo}: {detail}")]
    Connection { repo: String, detail: String },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Retryable for RemoteError {
    fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Connection { .. } => true,
            RemoteError::Process(ProcessError::TimedOut { .. } | ProcessError::Io { .. }) => true,
            RemoteError::Process(ProcessError::NotFound { .. }) => false,
            RemoteError::InvalidInput(_) => false,
        }
    }
}

/// Errors from the version-control probe.
///
/// Only `fetch` and `pull` surface these; the read-only probes fail open.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ProbeError::Process(e) => e.is_timeout(),
        }
    }
}

/// Configuration errors raised by the orchestrators before any dispatch.
///
/// Operational failures never appear here; they are reported as outcomes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("registry error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("repository '{0}' appears more than once in the batch")]
    DuplicateRepository(String),

    #[error("parallelism must be at least 1")]
    ZeroParallelism,

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
