//! Built-in repository registry and filtering.
//!
//! # Tiers
//!
//! ```text
//! P0  core          critical path, always needed
//! P1  services      primary services
//! P2  services      secondary services
//! P3  auxiliary     docs, tooling, infrastructure
//! ```
//!
//! Every call to [`default_registry`] builds fresh descriptor values; callers
//! own what they get back and nothing is shared between scans.

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::error::WorkspaceError;
use crate::types::{RepoKind, RepositoryDescriptor, Tier, TierFilter};

/// Hosting organisation of the built-in registry.
pub const DEFAULT_ORG_URL: &str = "https://github.com/flotilla-platform";

const DEFAULT_ENTRIES: &[(&str, Tier, RepoKind)] = &[
    // P0: core
    ("platform-core", Tier::P0, RepoKind::Python),
    ("platform-api", Tier::P0, RepoKind::Python),
    ("platform-cli", Tier::P0, RepoKind::Python),
    // P1: primary services
    ("platform-web", Tier::P1, RepoKind::Nodejs),
    ("platform-auth", Tier::P1, RepoKind::Python),
    ("platform-db", Tier::P1, RepoKind::Python),
    ("platform-events", Tier::P1, RepoKind::Python),
    // P2: secondary services
    ("platform-match", Tier::P2, RepoKind::Python),
    ("platform-oracle", Tier::P2, RepoKind::Python),
    ("platform-notifications", Tier::P2, RepoKind::Python),
    ("platform-analytics", Tier::P2, RepoKind::Python),
    // P3: auxiliary / tooling
    ("platform-docs", Tier::P3, RepoKind::Nodejs),
    ("platform-infra", Tier::P3, RepoKind::Mixed),
    ("platform-ci", Tier::P3, RepoKind::Mixed),
    ("platform-sdk", Tier::P3, RepoKind::Python),
    ("platform-admin", Tier::P3, RepoKind::Nodejs),
    ("platform-templates", Tier::P3, RepoKind::Mixed),
    ("platform-shared", Tier::P3, RepoKind::Python),
];

// ---------------------------------------------------------------------------
// 1. Registry construction
// ---------------------------------------------------------------------------

/// The built-in registry, in tier order.
pub fn default_registry() -> Vec<RepositoryDescriptor> {
    DEFAULT_ENTRIES
        .iter()
        .map(|(name, tier, kind)| {
            RepositoryDescriptor::new(*name, *tier, *kind, format!("{DEFAULT_ORG_URL}/{name}.git"))
        })
        .collect()
}

/// Reject registries with unusable or duplicate names, or remotes that don't
/// map to `owner/name`.
pub fn validate(repos: &[RepositoryDescriptor]) -> Result<(), WorkspaceError> {
    let mut seen = HashSet::new();
    for repo in repos {
        check_name(repo.name.as_str())?;
        if !seen.insert(repo.name.as_str()) {
            return Err(WorkspaceError::DuplicateRepository(repo.name.0.clone()));
        }
        repo.remote_id()?;
    }
    Ok(())
}

/// A name becomes `<workspace>/<name>`, so it must be exactly one normal
/// path component on every platform.
fn check_name(name: &str) -> Result<(), WorkspaceError> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.contains(['/', '\\']) {
        return Err(WorkspaceError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Filters
// ---------------------------------------------------------------------------

/// Keep repositories in the given tiers. An empty filter or `all` keeps everything.
pub fn filter_by_tier(
    repos: Vec<RepositoryDescriptor>,
    tiers: &[TierFilter],
) -> Vec<RepositoryDescriptor> {
    if tiers.is_empty() || tiers.contains(&TierFilter::All) {
        return repos;
    }
    repos
        .into_iter()
        .filter(|r| tiers.contains(&TierFilter::Only(r.tier)))
        .collect()
}

/// Keep repositories with the given names. An empty filter or `all` keeps everything.
pub fn filter_by_name<S: AsRef<str>>(
    repos: Vec<RepositoryDescriptor>,
    names: &[S],
) -> Vec<RepositoryDescriptor> {
    if names.is_empty() || names.iter().any(|n| n.as_ref() == "all") {
        return repos;
    }
    repos
        .into_iter()
        .filter(|r| names.iter().any(|n| n.as_ref() == r.name.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_registry_is_valid() {
        let repos = default_registry();
        assert!(!repos.is_empty());
        validate(&repos).expect("built-in registry must validate");
        assert!(repos.iter().all(|r| !r.is_present()));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("/tmp/elsewhere")]
    #[case("../escape")]
    #[case("nested/name")]
    #[case("back\\slash")]
    fn unusable_names_are_rejected(#[case] name: &str) {
        let repos = vec![RepositoryDescriptor::new(name, Tier::P0, RepoKind::Python, "acme/x")];
        let err = validate(&repos).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName(_)), "{name:?}: {err}");
    }

    #[test]
    fn dotted_names_are_fine() {
        let repos = vec![RepositoryDescriptor::new("site.io", Tier::P3, RepoKind::Nodejs, "acme/site.io")];
        validate(&repos).expect("dots inside a name are allowed");
    }

    #[test]
    fn default_registry_is_tier_ordered() {
        let tiers: Vec<Tier> = default_registry().iter().map(|r| r.tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn filter_by_tier_all_keeps_everything() {
        let n = default_registry().len();
        assert_eq!(filter_by_tier(default_registry(), &[TierFilter::All]).len(), n);
        assert_eq!(filter_by_tier(default_registry(), &[]).len(), n);
    }

    #[test]
    fn filter_by_tier_selects_tier() {
        let p0 = filter_by_tier(default_registry(), &[TierFilter::Only(Tier::P0)]);
        assert_eq!(p0.len(), 3);
        assert!(p0.iter().all(|r| r.tier == Tier::P0));
    }

    #[test]
    fn filter_by_name_selects_names() {
        let picked = filter_by_name(default_registry(), &["platform-web", "missing"]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name.as_str(), "platform-web");
    }

    #[test]
    fn validate_rejects_duplicates() {
        let mut repos = default_registry();
        repos.push(repos[0].clone());
        let err = validate(&repos).unwrap_err();
        assert!(matches!(err, WorkspaceError::DuplicateRepository(_)));
    }

    #[test]
    fn validate_rejects_bad_remote() {
        let repos = vec![RepositoryDescriptor::new(
            "x",
            Tier::P1,
            RepoKind::Mixed,
            "not a remote",
        )];
        assert!(matches!(
            validate(&repos).unwrap_err(),
            WorkspaceError::InvalidRemote { .. }
        ));
    }
}
