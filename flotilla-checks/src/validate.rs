//! Per-repository compliance checks.
//!
//! | check          | passes when                                              | fixable |
//! |----------------|----------------------------------------------------------|---------|
//! | `constitution` | one of [`CONSTITUTION_PATHS`] exists                     | yes     |
//! | `context`      | `.context/` exists and is non-empty                      | yes     |
//! | `links`        | relative markdown links resolve (first 50 `*.md` files)  | no      |
//! | `hooks`        | `.pre-commit-config.yaml` and `.git/hooks/pre-commit`    | no      |

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::{io_err, CheckError};

pub const CONSTITUTION_PATHS: &[&str] = &[
    ".specify/memory/constitution.md",
    "CONSTITUTION.md",
    "docs/constitution.md",
];
pub const CONTEXT_DIR: &str = ".context";
pub const MAX_MARKDOWN_FILES: usize = 50;

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").expect("static regex is valid"));

const CONSTITUTION_TEMPLATE: &str = "\
# Constitution

## Principles

1. Every change is reviewed.
2. Every service ships with tests.
3. Interfaces are documented before they are consumed.
";

const CONTEXT_README: &str = "\
# Context

Architecture notes, decisions and agent context for this repository.
";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Constitution,
    Context,
    Links,
    Hooks,
}

impl CheckKind {
    pub const ALL: [CheckKind; 4] = [
        CheckKind::Constitution,
        CheckKind::Context,
        CheckKind::Links,
        CheckKind::Hooks,
    ];
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckKind::Constitution => "constitution",
            CheckKind::Context => "context",
            CheckKind::Links => "links",
            CheckKind::Hooks => "hooks",
        };
        f.write_str(s)
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown check '{s}'; expected constitution, context, links or hooks"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub auto_fixable: bool,
    pub fixed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ValidationCheck {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.into(),
            auto_fixable: false,
            fixed: false,
            file: None,
        }
    }

    fn fail(name: &str, message: impl Into<String>, auto_fixable: bool) -> Self {
        Self {
            passed: false,
            auto_fixable,
            ..Self::pass(name, message)
        }
    }
}

/// All checks for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub repo: String,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationResult {
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn fixed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.fixed).count()
    }

    /// Percentage of passing checks; 100 when nothing ran.
    pub fn score(&self) -> f64 {
        if self.checks.is_empty() {
            return 100.0;
        }
        self.passed_count() as f64 * 100.0 / self.checks.len() as f64
    }

    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Checks to run; empty means all.
    pub checks: Vec<CheckKind>,
    pub auto_fix: bool,
}

impl ValidateOptions {
    fn wants(&self, kind: CheckKind) -> bool {
        self.checks.is_empty() || self.checks.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn validate_repo(
    path: &Path,
    repo: &str,
    options: &ValidateOptions,
) -> Result<ValidationResult, CheckError> {
    let mut checks = Vec::new();

    if options.wants(CheckKind::Constitution) {
        checks.push(check_constitution(path, options.auto_fix)?);
    }
    if options.wants(CheckKind::Context) {
        checks.push(check_context(path, options.auto_fix)?);
    }
    if options.wants(CheckKind::Links) {
        checks.extend(check_markdown_links(path)?);
    }
    if options.wants(CheckKind::Hooks) {
        checks.push(check_hooks(path));
    }

    let result = ValidationResult {
        repo: repo.to_string(),
        checks,
    };
    tracing::info!(
        repo,
        passed = result.passed_count(),
        failed = result.failed_count(),
        fixed = result.fixed_count(),
        "validated"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_constitution(path: &Path, auto_fix: bool) -> Result<ValidationCheck, CheckError> {
    const NAME: &str = "constitution_presence";

    if let Some(found) = CONSTITUTION_PATHS.iter().find(|p| path.join(p).exists()) {
        return Ok(ValidationCheck::pass(NAME, format!("Constitution found at {found}")));
    }
    if !auto_fix {
        return Ok(ValidationCheck::fail(NAME, "No constitution file found", true));
    }

    let target = path.join(CONSTITUTION_PATHS[0]);
    write_scaffold(&target, CONSTITUTION_TEMPLATE)?;
    Ok(ValidationCheck {
        fixed: true,
        file: Some(target),
        ..ValidationCheck::pass(NAME, format!("Created {}", CONSTITUTION_PATHS[0]))
    })
}

fn check_context(path: &Path, auto_fix: bool) -> Result<ValidationCheck, CheckError> {
    const NAME: &str = "context_artifacts";

    let dir = path.join(CONTEXT_DIR);
    let count = match fs::read_dir(&dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    if count > 0 {
        return Ok(ValidationCheck::pass(
            NAME,
            format!("{CONTEXT_DIR}/ directory found with {count} files"),
        ));
    }
    if !auto_fix {
        return Ok(ValidationCheck::fail(
            NAME,
            format!("No {CONTEXT_DIR}/ context artifacts found"),
            true,
        ));
    }

    let target = dir.join("README.md");
    write_scaffold(&target, CONTEXT_README)?;
    Ok(ValidationCheck {
        fixed: true,
        file: Some(target),
        ..ValidationCheck::pass(NAME, format!("Created {CONTEXT_DIR}/README.md"))
    })
}

fn check_markdown_links(path: &Path) -> Result<Vec<ValidationCheck>, CheckError> {
    const NAME: &str = "markdown_links";

    let files = markdown_files(path);
    let mut checks = Vec::new();
    for file in &files {
        let content = fs::read(file).map_err(|e| io_err(file, e))?;
        let content = String::from_utf8_lossy(&content);
        let base = file.parent().unwrap_or(path);
        let broken = find_broken_links(&content, base);
        if broken.is_empty() {
            continue;
        }
        let rel = file.strip_prefix(path).unwrap_or(file);
        let summary = broken.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        checks.push(ValidationCheck {
            file: Some(file.clone()),
            ..ValidationCheck::fail(
                NAME,
                format!("Broken links in {}: {summary}", rel.display()),
                false,
            )
        });
    }

    if checks.is_empty() {
        checks.push(ValidationCheck::pass(
            NAME,
            format!("All links valid in {} markdown files", files.len()),
        ));
    }
    Ok(checks)
}

fn check_hooks(path: &Path) -> ValidationCheck {
    if !path.join(".pre-commit-config.yaml").exists() {
        return ValidationCheck::fail("pre_commit_config", "No .pre-commit-config.yaml found", false);
    }
    if !path.join(".git/hooks/pre-commit").exists() {
        return ValidationCheck::fail(
            "pre_commit_installed",
            "Pre-commit hooks not installed (run `pre-commit install`)",
            true,
        );
    }
    ValidationCheck::pass("pre_commit_hooks", "Pre-commit configured and installed")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && matches!(entry.file_name().to_str(), Some(".git" | "node_modules"))
}

/// Up to [`MAX_MARKDOWN_FILES`] markdown files, in a stable order.
fn markdown_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .take(MAX_MARKDOWN_FILES)
        .map(DirEntry::into_path)
        .collect()
}

/// Relative link targets in `content` that do not exist under `base`.
fn find_broken_links(content: &str, base: &Path) -> Vec<String> {
    MARKDOWN_LINK
        .captures_iter(content)
        .filter_map(|cap| cap.get(2).map(|m| m.as_str().trim()))
        .filter(|link| {
            !(link.starts_with("http://")
                || link.starts_with("https://")
                || link.starts_with('#')
                || link.starts_with("mailto:"))
        })
        .map(|link| link.split('#').next().unwrap_or_default())
        .filter(|target| !target.is_empty() && !base.join(target).exists())
        .map(str::to_string)
        .collect()
}

fn write_scaffold(target: &Path, content: &str) -> Result<(), CheckError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(target, content).map_err(|e| io_err(target, e))?;
    tracing::info!(path = %target.display(), "scaffolded missing file");
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
