//! Error types for flotilla-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry and workspace configuration handling.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse workspace config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No `.flotilla-workspace.yml` between `start` and the filesystem root.
    #[error("no workspace found above {start}; run `flotilla init` first")]
    WorkspaceNotFound { start: PathBuf },

    #[error("invalid remote '{url}'; expected owner/name or a github URL")]
    InvalidRemote { url: String },

    #[error("invalid tier '{0}'; expected one of P0, P1, P2, P3")]
    InvalidTier(String),

    #[error("invalid repository kind '{0}'; expected one of python, nodejs, mixed")]
    InvalidKind(String),

    #[error("invalid repository name '{0}'; expected a single directory name")]
    InvalidName(String),

    #[error("duplicate repository '{0}' in registry")]
    DuplicateRepository(String),

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("cannot convert '{value}' to {expected} for {key}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("{key} must be {min}-{max}, got {value}")]
    OutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },
}
