//! Error types for flotilla-checks.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from checks that touch the filesystem.
#[derive(Debug, Error)]
pub enum CheckError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unknown artifact type '{0}'; expected one of python, venv, node, build, coverage")]
    UnknownArtifactType(String),
}

/// Convenience constructor for [`CheckError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CheckError {
    CheckError::Io {
        path: path.into(),
        source,
    }
}
