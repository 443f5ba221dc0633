//! Workspace discovery, config persistence and checkout scanning.
//!
//! # Layout
//!
//! ```text
//! <workspace>/
//!   .flotilla-workspace.yml   (config: atomic writes)
//!   .flotilla/logs/           (structured JSON logs)
//!   <repo>/                   (one checkout per registry entry)
//! ```

use std::path::{Path, PathBuf};

use crate::config::WorkspaceConfig;
use crate::error::WorkspaceError;
use crate::registry;
use crate::types::{RepositoryDescriptor, TierFilter};

pub const CONFIG_FILENAME: &str = ".flotilla-workspace.yml";
pub const STATE_DIR: &str = ".flotilla";

// ---------------------------------------------------------------------------
// 1. Paths
// ---------------------------------------------------------------------------

/// `<root>/.flotilla-workspace.yml`: pure, no I/O.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILENAME)
}

/// `<root>/.flotilla/logs`
pub fn logs_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join("logs")
}

/// Walk up from `start` to the first directory holding a workspace config.
pub fn discover_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|dir| config_path(dir).is_file())
        .map(Path::to_path_buf)
}

/// Like [`discover_root`] but an absent workspace is an error.
pub fn require_root(start: &Path) -> Result<PathBuf, WorkspaceError> {
    discover_root(start).ok_or_else(|| WorkspaceError::WorkspaceNotFound {
        start: start.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// 2. Load / save
// ---------------------------------------------------------------------------

/// Load and validate the workspace config. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<WorkspaceConfig, WorkspaceError> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(WorkspaceConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    let config = WorkspaceConfig::from_yaml(&contents)
        .map_err(|source| WorkspaceError::Parse { path, source })?;
    config.validate()?;
    Ok(config)
}

/// Atomically save the workspace config.
///
/// Write flow: validate → serialize → `.yml.tmp` sibling → `rename`.
pub fn save_config(root: &Path, config: &WorkspaceConfig) -> Result<(), WorkspaceError> {
    config.validate()?;
    std::fs::create_dir_all(root)?;
    let path = config_path(root);
    let tmp_path = path.with_file_name(format!("{CONFIG_FILENAME}.tmp"));

    let yaml = config.to_yaml()?;
    std::fs::write(&tmp_path, yaml)?;
    std::fs::rename(&tmp_path, &path)?;
    tracing::debug!(path = %path.display(), "saved workspace config");
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Scan
// ---------------------------------------------------------------------------

/// The registry in effect: the config override if present, else the built-in one.
pub fn registry_for(config: &WorkspaceConfig) -> Vec<RepositoryDescriptor> {
    if config.repositories.is_empty() {
        registry::default_registry()
    } else {
        config.repositories.clone()
    }
}

/// Filtered registry with presence detection.
///
/// A repository is present when `<root>/<name>/.git` exists. Every returned
/// descriptor is a fresh value.
pub fn scan_repos<S: AsRef<str>>(
    root: &Path,
    config: &WorkspaceConfig,
    tiers: &[TierFilter],
    names: &[S],
) -> Vec<RepositoryDescriptor> {
    let repos = registry::filter_by_tier(registry_for(config), tiers);
    let repos = registry::filter_by_name(repos, names);

    repos
        .into_iter()
        .map(|repo| {
            let local = root.join(repo.name.as_str());
            if local.join(".git").exists() {
                repo.with_checkout(local)
            } else {
                repo
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RepoKind, Tier};
    use tempfile::TempDir;

    #[test]
    fn load_missing_config_returns_defaults() {
        let root = TempDir::new().unwrap();
        let config = load_config(root.path()).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn save_cleans_up_tmp() {
        let root = TempDir::new().unwrap();
        save_config(root.path(), &WorkspaceConfig::default()).unwrap();
        assert!(config_path(root.path()).exists());
        assert!(!root.path().join(format!("{CONFIG_FILENAME}.tmp")).exists());
    }

    #[test]
    fn save_refuses_invalid_config() {
        let root = TempDir::new().unwrap();
        let config = WorkspaceConfig {
            sync_timeout: 1,
            ..WorkspaceConfig::default()
        };
        assert!(save_config(root.path(), &config).is_err());
        assert!(!config_path(root.path()).exists());
    }

    #[test]
    fn discover_walks_up() {
        let root = TempDir::new().unwrap();
        save_config(root.path(), &WorkspaceConfig::default()).unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let found = discover_root(&nested).expect("found");
        assert_eq!(found, root.path().canonicalize().unwrap());
    }

    #[test]
    fn scan_marks_checkouts_present() {
        let root = TempDir::new().unwrap();
        let config = WorkspaceConfig {
            repositories: vec![
                RepositoryDescriptor::new("alpha", Tier::P0, RepoKind::Python, "acme/alpha"),
                RepositoryDescriptor::new("beta", Tier::P1, RepoKind::Nodejs, "acme/beta"),
            ],
            ..WorkspaceConfig::default()
        };
        std::fs::create_dir_all(root.path().join("alpha").join(".git")).unwrap();
        // A plain directory without .git is not a checkout.
        std::fs::create_dir_all(root.path().join("beta")).unwrap();

        let repos = scan_repos::<&str>(root.path(), &config, &[], &[]);
        assert_eq!(repos.len(), 2);
        assert!(repos[0].is_present());
        assert_eq!(repos[0].checkout(), Some(root.path().join("alpha").as_path()));
        assert!(!repos[1].is_present());
    }
}
