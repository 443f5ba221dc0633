//! Flotilla core library: domain types, registry, workspace config, errors.
//!
//! - [`types`]: newtypes, tiers, repository descriptors
//! - [`error`]: [`WorkspaceError`]
//! - [`registry`]: built-in registry and filters
//! - [`config`]: the closed [`WorkspaceConfig`] and its key table
//! - [`workspace`]: discovery, load / save, checkout scanning

pub mod config;
pub mod error;
pub mod registry;
pub mod types;
pub mod workspace;

pub use config::{ConfigKey, ConfigValue, WorkspaceConfig};
pub use error::WorkspaceError;
pub use types::{RemoteId, RepoKind, RepoName, RepositoryDescriptor, Tier, TierFilter};
