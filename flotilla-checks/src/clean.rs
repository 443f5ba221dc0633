//! Build and cache artifact cleanup.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::{io_err, CheckError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Python,
    Venv,
    Node,
    Build,
    Coverage,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 5] = [
        ArtifactType::Python,
        ArtifactType::Venv,
        ArtifactType::Node,
        ArtifactType::Build,
        ArtifactType::Coverage,
    ];

    /// Entry names matched by this type. A leading `*` matches a suffix.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            ArtifactType::Python => &[
                "__pycache__",
                ".pytest_cache",
                ".ruff_cache",
                "*.egg-info",
                ".mypy_cache",
            ],
            ArtifactType::Venv => &[".venv", "venv"],
            ArtifactType::Node => &["node_modules"],
            ArtifactType::Build => &["dist", "build", ".next", "out"],
            ArtifactType::Coverage => &[".coverage", "htmlcov", "coverage"],
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactType::Python => "python",
            ArtifactType::Venv => "venv",
            ArtifactType::Node => "node",
            ArtifactType::Build => "build",
            ArtifactType::Coverage => "coverage",
        };
        f.write_str(s)
    }
}

impl FromStr for ArtifactType {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        ArtifactType::ALL
            .into_iter()
            .find(|t| t.to_string() == lower)
            .ok_or_else(|| CheckError::UnknownArtifactType(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanResult {
    pub name: String,
    pub items_found: usize,
    pub items_removed: usize,
    pub bytes_reclaimed: u64,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    /// Types to look for; empty means all.
    pub types: Vec<ArtifactType>,
    pub dry_run: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            dry_run: true,
        }
    }
}

/// Find (and unless `dry_run`, delete) artifacts under `path`.
///
/// Matched directories are not descended into, so nested matches such as
/// `node_modules/pkg/dist` are counted once with their parent.
pub fn clean_repo(path: &Path, name: &str, options: &CleanOptions) -> Result<CleanResult, CheckError> {
    let types: &[ArtifactType] = if options.types.is_empty() {
        &ArtifactType::ALL[..]
    } else {
        options.types.as_slice()
    };

    let mut result = CleanResult {
        name: name.to_string(),
        ..CleanResult::default()
    };

    for artifact in find_artifacts(path, types) {
        let size = disk_usage(&artifact);
        let rel = artifact.strip_prefix(path).unwrap_or(&artifact).display().to_string();
        result.items_found += 1;

        if options.dry_run {
            result.details.push(format!("[DRY] Remove: {rel} ({})", format_size(size)));
            result.bytes_reclaimed += size;
            continue;
        }

        let removed = if artifact.is_dir() {
            fs::remove_dir_all(&artifact)
        } else {
            fs::remove_file(&artifact)
        };
        match removed {
            Ok(()) => {
                result.items_removed += 1;
                result.bytes_reclaimed += size;
                result.details.push(format!("Removed: {rel} ({})", format_size(size)));
            }
            Err(e) => {
                tracing::warn!(path = %artifact.display(), error = %e, "failed to remove artifact");
                result.details.push(format!("Failed: {rel} ({})", io_err(&artifact, e)));
            }
        }
    }

    tracing::info!(
        repo = name,
        found = result.items_found,
        removed = result.items_removed,
        bytes = result.bytes_reclaimed,
        dry_run = options.dry_run,
        "cleaned"
    );
    Ok(result)
}

fn matches_any(name: &str, types: &[ArtifactType]) -> bool {
    types.iter().flat_map(|t| t.patterns()).any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == *pattern,
    })
}

fn find_artifacts(root: &Path, types: &[ArtifactType]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e));

    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        let Some(name) = entry.file_name().to_str() else { continue };
        if matches_any(name, types) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            found.push(entry.into_path());
        }
    }
    found
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// Total size in bytes of a file or directory tree. Unreadable entries count as zero.
pub fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// `512.0 B`, `1.5 KB`, `3.2 GB`...
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}
