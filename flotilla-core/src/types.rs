//! Domain types for the Flotilla repository registry.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Registry-facing types are serializable via serde + serde_yaml so a workspace
//! config can override the built-in registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed repository name. Unique key within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoName(pub String);

impl RepoName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// `owner/name` identifier understood by the hosting CLI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteId {
    owner: String,
    name: String,
}

impl RemoteId {
    /// Derive a remote id from a hosting URL such as
    /// `https://github.com/owner/name.git`. Bare `owner/name` is accepted too.
    pub fn from_url(url: &str) -> Result<Self, WorkspaceError> {
        let trimmed = url.trim().trim_end_matches('/');
        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("git@github.com:"))
            .unwrap_or(trimmed);
        let path = path.strip_suffix(".git").unwrap_or(path);
        path.parse().map_err(|_| WorkspaceError::InvalidRemote {
            url: url.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RemoteId {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorkspaceError::InvalidRemote { url: s.to_string() };
        let (owner, name) = s.split_once('/').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Priority tier of a repository. Used for filtering, never for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    P0,
    P1,
    P2,
    P3,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::P0, Tier::P1, Tier::P2, Tier::P3];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::P0 => write!(f, "P0"),
            Tier::P1 => write!(f, "P1"),
            Tier::P2 => write!(f, "P2"),
            Tier::P3 => write!(f, "P3"),
        }
    }
}

impl FromStr for Tier {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P0" => Ok(Tier::P0),
            "P1" => Ok(Tier::P1),
            "P2" => Ok(Tier::P2),
            "P3" => Ok(Tier::P3),
            _ => Err(WorkspaceError::InvalidTier(s.to_string())),
        }
    }
}

/// Tier filter as given on the command line: a tier, or `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierFilter {
    All,
    Only(Tier),
}

impl FromStr for TierFilter {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(TierFilter::All);
        }
        s.parse().map(TierFilter::Only)
    }
}

impl fmt::Display for TierFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierFilter::All => write!(f, "all"),
            TierFilter::Only(tier) => tier.fmt(f),
        }
    }
}

/// Language/runtime kind of a repository; drives dependency setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    #[default]
    Python,
    Nodejs,
    Mixed,
}

impl RepoKind {
    pub fn uses_python(self) -> bool {
        matches!(self, RepoKind::Python | RepoKind::Mixed)
    }

    pub fn uses_node(self) -> bool {
        matches!(self, RepoKind::Nodejs | RepoKind::Mixed)
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoKind::Python => write!(f, "python"),
            RepoKind::Nodejs => write!(f, "nodejs"),
            RepoKind::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for RepoKind {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(RepoKind::Python),
            "nodejs" => Ok(RepoKind::Nodejs),
            "mixed" => Ok(RepoKind::Mixed),
            _ => Err(WorkspaceError::InvalidKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Identity of a repository known to the workspace.
///
/// Descriptors are plain values: a workspace scan hands out fresh copies with
/// the checkout fields filled in, nothing shared is ever mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryDescriptor {
    pub name: RepoName,
    pub tier: Tier,
    pub kind: RepoKind,
    /// Hosting URL, e.g. `https://github.com/owner/name.git`.
    pub remote_url: String,
    #[serde(skip)]
    local_path: Option<PathBuf>,
    #[serde(skip)]
    present: bool,
}

impl RepositoryDescriptor {
    pub fn new(
        name: impl Into<RepoName>,
        tier: Tier,
        kind: RepoKind,
        remote_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tier,
            kind,
            remote_url: remote_url.into(),
            local_path: None,
            present: false,
        }
    }

    /// Copy of this descriptor marked present at `path`.
    pub fn with_checkout(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: Some(path.into()),
            present: true,
            ..self.clone()
        }
    }

    pub fn remote_id(&self) -> Result<RemoteId, WorkspaceError> {
        RemoteId::from_url(&self.remote_url)
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Local checkout, only when the repository is present.
    pub fn checkout(&self) -> Option<&Path> {
        if self.present {
            self.local_path.as_deref()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(RepoName::from("core").to_string(), "core");
    }

    #[test]
    fn remote_id_from_https_url() {
        let id = RemoteId::from_url("https://github.com/flotilla-platform/api.git").unwrap();
        assert_eq!(id.owner(), "flotilla-platform");
        assert_eq!(id.name(), "api");
        assert_eq!(id.to_string(), "flotilla-platform/api");
    }

    #[test]
    fn remote_id_keeps_trailing_t_in_name() {
        // A naive character strip of ".git" would eat the trailing "t".
        let id = RemoteId::from_url("https://github.com/acme/chat.git").unwrap();
        assert_eq!(id.name(), "chat");
        let id = RemoteId::from_url("https://github.com/acme/widget").unwrap();
        assert_eq!(id.name(), "widget");
    }

    #[test]
    fn remote_id_rejects_garbage() {
        assert!(RemoteId::from_url("https://example.com/nothing").is_err());
        assert!(RemoteId::from_url("owner/").is_err());
        assert!(RemoteId::from_url("a/b/c").is_err());
    }

    #[test]
    fn tier_parse_and_display() {
        assert_eq!("p2".parse::<Tier>().unwrap(), Tier::P2);
        assert_eq!(Tier::P0.to_string(), "P0");
        assert!("P9".parse::<Tier>().is_err());
        assert_eq!("all".parse::<TierFilter>().unwrap(), TierFilter::All);
    }

    #[test]
    fn checkout_requires_presence() {
        let d = RepositoryDescriptor::new("api", Tier::P0, RepoKind::Python, "acme/api");
        assert!(!d.is_present());
        assert!(d.checkout().is_none());
        let present = d.with_checkout("/ws/api");
        assert!(present.is_present());
        assert_eq!(present.checkout(), Some(Path::new("/ws/api")));
        assert!(!d.is_present(), "original value must be untouched");
    }

    #[test]
    fn descriptor_yaml_rejects_unknown_fields() {
        let yaml = "name: api\ntier: P1\nkind: nodejs\nremote_url: acme/api\nextra: 1\n";
        assert!(serde_yaml::from_str::<RepositoryDescriptor>(yaml).is_err());
        let yaml = "name: api\ntier: P1\nkind: nodejs\nremote_url: acme/api\n";
        let d: RepositoryDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.kind, RepoKind::Nodejs);
        assert!(!d.is_present());
    }
}
