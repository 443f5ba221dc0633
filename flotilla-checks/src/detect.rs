//! Repository kind detection.
//!
//! `detect_repo_kind(path)` inspects manifest files in a checkout root and
//! returns the runtime kind plus the framework, when one is recognisable.
//! A checkout with both Python and Node manifests, or with neither, is mixed.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use flotilla_core::RepoKind;
use serde::Serialize;

use crate::error::{io_err, CheckError};

const PYTHON_MANIFESTS: &[&str] = &["pyproject.toml", "setup.py", "requirements.txt", "Pipfile"];
const NODE_MANIFEST: &str = "package.json";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Confidence level of a detected kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Manifest present and a framework matched.
    High,
    /// Manifest present, no framework match.
    Medium,
    /// No manifest at all; the kind is a fallback.
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedKind {
    pub kind: RepoKind,
    /// Framework or runtime, if identified (e.g. `"FastAPI"`, `"Next.js"`).
    pub framework: Option<String>,
    /// Manifest files that drove the decision.
    pub indicators: Vec<String>,
    pub confidence: Confidence,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn detect_repo_kind(path: &Path) -> Result<DetectedKind, CheckError> {
    let python = detect_python(path)?;
    let node = detect_node(path)?;

    let detected = match (python, node) {
        (Some(py), Some(js)) => DetectedKind {
            kind: RepoKind::Mixed,
            confidence: if py.framework.is_some() || js.framework.is_some() {
                Confidence::High
            } else {
                Confidence::Medium
            },
            framework: py.framework.or(js.framework),
            indicators: [py.indicators, js.indicators].concat(),
        },
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => DetectedKind {
            kind: RepoKind::Mixed,
            framework: None,
            indicators: Vec::new(),
            confidence: Confidence::Low,
        },
    };

    tracing::debug!(
        path = %path.display(),
        kind = %detected.kind,
        framework = ?detected.framework,
        "detected repository kind"
    );
    Ok(detected)
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

fn detect_python(path: &Path) -> Result<Option<DetectedKind>, CheckError> {
    let indicators: Vec<String> = PYTHON_MANIFESTS
        .iter()
        .filter(|m| path.join(m).exists())
        .map(|m| m.to_string())
        .collect();
    if indicators.is_empty() {
        return Ok(None);
    }

    let mut content = String::new();
    for manifest in &indicators {
        let file = path.join(manifest);
        content.push_str(&fs::read_to_string(&file).map_err(|e| io_err(&file, e))?);
        content.push('\n');
    }
    let lower = content.to_lowercase();

    let framework = if lower.contains("fastapi") {
        Some("FastAPI")
    } else if lower.contains("django") {
        Some("Django")
    } else if lower.contains("flask") {
        Some("Flask")
    } else if lower.contains("starlette") {
        Some("Starlette")
    } else if lower.contains("typer") || lower.contains("click") {
        Some("CLI")
    } else {
        None
    };

    Ok(Some(DetectedKind {
        kind: RepoKind::Python,
        framework: framework.map(str::to_string),
        indicators,
        confidence: if framework.is_some() { Confidence::High } else { Confidence::Medium },
    }))
}

fn detect_node(path: &Path) -> Result<Option<DetectedKind>, CheckError> {
    let file = path.join(NODE_MANIFEST);
    if !file.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&file).map_err(|e| io_err(&file, e))?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| CheckError::Parse {
        path: file.clone(),
        message: e.to_string(),
    })?;

    let deps = collect_package_json_deps(&json);
    let framework = if deps.contains("next") {
        Some("Next.js")
    } else if deps.contains("astro") {
        Some("Astro")
    } else if deps.contains("@docusaurus/core") {
        Some("Docusaurus")
    } else if deps.contains("vue") {
        Some("Vue")
    } else if deps.contains("react") {
        Some("React")
    } else if deps.contains("@nestjs/core") {
        Some("NestJS")
    } else if deps.contains("express") {
        Some("Express")
    } else {
        None
    };

    Ok(Some(DetectedKind {
        kind: RepoKind::Nodejs,
        framework: framework.map(str::to_string),
        indicators: vec![NODE_MANIFEST.to_string()],
        confidence: if framework.is_some() { Confidence::High } else { Confidence::Medium },
    }))
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn collect_package_json_deps(json: &serde_json::Value) -> HashSet<String> {
    let mut deps = HashSet::new();
    for key in &["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(obj) = json.get(key).and_then(|v| v.as_object()) {
            deps.extend(obj.keys().cloned());
        }
    }
    deps
}
