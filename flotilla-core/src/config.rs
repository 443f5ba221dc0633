//! Workspace configuration persisted to `.flotilla-workspace.yml`.
//!
//! The field set is closed: unknown YAML keys are rejected on load, and the
//! `config get|set|reset` surface goes through [`ConfigKey`], which carries the
//! type and range of every settable field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;
use crate::types::{RepositoryDescriptor, Tier};

pub const SCHEMA_VERSION: &str = "1.0.0";

pub const PARALLEL_RANGE: (i64, i64) = (1, 16);
pub const SYNC_TIMEOUT_RANGE: (i64, i64) = (10, 600);

/// Persistent workspace settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub schema_version: String,

    /// Registry override. Empty means the built-in registry.
    pub repositories: Vec<RepositoryDescriptor>,

    // Sync preferences
    pub parallel_count: usize,
    pub auto_pull: bool,
    /// Per-repository sync timeout in seconds.
    pub sync_timeout: u64,

    // Validation preferences
    pub auto_fix: bool,
    pub constitution_check: bool,
    pub link_check: bool,

    // Setup preferences
    pub install_hooks: bool,
    pub create_venvs: bool,

    // Global
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tier: Option<Tier>,
    pub verbose: bool,
    pub json_output: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            repositories: Vec::new(),
            parallel_count: 4,
            auto_pull: false,
            sync_timeout: 120,
            auto_fix: false,
            constitution_check: true,
            link_check: true,
            install_hooks: true,
            create_venvs: true,
            default_tier: None,
            verbose: false,
            json_output: false,
        }
    }
}

impl WorkspaceConfig {
    /// Range-check numeric fields and validate the registry override.
    pub fn validate(&self) -> Result<(), WorkspaceError> {
        check_range(ConfigKey::ParallelCount, self.parallel_count as i64)?;
        check_range(ConfigKey::SyncTimeout, self.sync_timeout as i64)?;
        crate::registry::validate(&self.repositories)?;
        Ok(())
    }

    /// Parse and validate. An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, WorkspaceError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        match key {
            ConfigKey::ParallelCount => ConfigValue::Int(self.parallel_count as i64),
            ConfigKey::AutoPull => ConfigValue::Bool(self.auto_pull),
            ConfigKey::SyncTimeout => ConfigValue::Int(self.sync_timeout as i64),
            ConfigKey::AutoFix => ConfigValue::Bool(self.auto_fix),
            ConfigKey::ConstitutionCheck => ConfigValue::Bool(self.constitution_check),
            ConfigKey::LinkCheck => ConfigValue::Bool(self.link_check),
            ConfigKey::InstallHooks => ConfigValue::Bool(self.install_hooks),
            ConfigKey::CreateVenvs => ConfigValue::Bool(self.create_venvs),
            ConfigKey::Verbose => ConfigValue::Bool(self.verbose),
            ConfigKey::JsonOutput => ConfigValue::Bool(self.json_output),
        }
    }

    /// Coerce `raw` to the key's type, range-check it, and store it.
    pub fn set(&mut self, key: ConfigKey, raw: &str) -> Result<ConfigValue, WorkspaceError> {
        let value = key.coerce(raw)?;
        match (key, value) {
            (ConfigKey::ParallelCount, ConfigValue::Int(v)) => self.parallel_count = v as usize,
            (ConfigKey::SyncTimeout, ConfigValue::Int(v)) => self.sync_timeout = v as u64,
            (ConfigKey::AutoPull, ConfigValue::Bool(v)) => self.auto_pull = v,
            (ConfigKey::AutoFix, ConfigValue::Bool(v)) => self.auto_fix = v,
            (ConfigKey::ConstitutionCheck, ConfigValue::Bool(v)) => self.constitution_check = v,
            (ConfigKey::LinkCheck, ConfigValue::Bool(v)) => self.link_check = v,
            (ConfigKey::InstallHooks, ConfigValue::Bool(v)) => self.install_hooks = v,
            (ConfigKey::CreateVenvs, ConfigValue::Bool(v)) => self.create_venvs = v,
            (ConfigKey::Verbose, ConfigValue::Bool(v)) => self.verbose = v,
            (ConfigKey::JsonOutput, ConfigValue::Bool(v)) => self.json_output = v,
            _ => unreachable!("coerce returns the key's own value type"),
        }
        Ok(value)
    }

    /// Restore one key to its default.
    pub fn reset(&mut self, key: ConfigKey) {
        let default = WorkspaceConfig::default();
        let value = default.get(key).to_string();
        // Defaults are always in range.
        let _ = self.set(key, &value);
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Every key reachable through `config get|set|reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ParallelCount,
    AutoPull,
    SyncTimeout,
    AutoFix,
    ConstitutionCheck,
    LinkCheck,
    InstallHooks,
    CreateVenvs,
    Verbose,
    JsonOutput,
}

/// Type tag of a config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int { min: i64, max: i64 },
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 10] = [
        ConfigKey::ParallelCount,
        ConfigKey::AutoPull,
        ConfigKey::SyncTimeout,
        ConfigKey::AutoFix,
        ConfigKey::ConstitutionCheck,
        ConfigKey::LinkCheck,
        ConfigKey::InstallHooks,
        ConfigKey::CreateVenvs,
        ConfigKey::Verbose,
        ConfigKey::JsonOutput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::ParallelCount => "parallel_count",
            ConfigKey::AutoPull => "auto_pull",
            ConfigKey::SyncTimeout => "sync_timeout",
            ConfigKey::AutoFix => "auto_fix",
            ConfigKey::ConstitutionCheck => "constitution_check",
            ConfigKey::LinkCheck => "link_check",
            ConfigKey::InstallHooks => "install_hooks",
            ConfigKey::CreateVenvs => "create_venvs",
            ConfigKey::Verbose => "verbose",
            ConfigKey::JsonOutput => "json_output",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConfigKey::ParallelCount => "Max concurrent operations",
            ConfigKey::AutoPull => "Auto-pull on sync",
            ConfigKey::SyncTimeout => "Sync timeout (seconds)",
            ConfigKey::AutoFix => "Auto-fix validation issues",
            ConfigKey::ConstitutionCheck => "Enable constitution checks",
            ConfigKey::LinkCheck => "Enable markdown link checks",
            ConfigKey::InstallHooks => "Install pre-commit hooks on setup",
            ConfigKey::CreateVenvs => "Create virtual environments on setup",
            ConfigKey::Verbose => "Enable verbose output",
            ConfigKey::JsonOutput => "Default to JSON output",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            ConfigKey::ParallelCount => ValueKind::Int {
                min: PARALLEL_RANGE.0,
                max: PARALLEL_RANGE.1,
            },
            ConfigKey::SyncTimeout => ValueKind::Int {
                min: SYNC_TIMEOUT_RANGE.0,
                max: SYNC_TIMEOUT_RANGE.1,
            },
            _ => ValueKind::Bool,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self.kind() {
            ValueKind::Bool => "bool",
            ValueKind::Int { .. } => "int",
        }
    }

    fn coerce(self, raw: &str) -> Result<ConfigValue, WorkspaceError> {
        let invalid = |expected| WorkspaceError::InvalidValue {
            key: self.as_str().to_string(),
            value: raw.to_string(),
            expected,
        };
        match self.kind() {
            ValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(ConfigValue::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(ConfigValue::Bool(false)),
                _ => Err(invalid("bool")),
            },
            ValueKind::Int { .. } => {
                let value: i64 = raw.trim().parse().map_err(|_| invalid("int"))?;
                check_range(self, value)?;
                Ok(ConfigValue::Int(value))
            }
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| WorkspaceError::UnknownKey(s.to_string()))
    }
}

/// A typed config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => v.fmt(f),
            ConfigValue::Int(v) => v.fmt(f),
        }
    }
}

fn check_range(key: ConfigKey, value: i64) -> Result<(), WorkspaceError> {
    if let ValueKind::Int { min, max } = key.kind() {
        if value < min || value > max {
            return Err(WorkspaceError::OutOfRange {
                key: key.as_str().to_string(),
                value,
                min,
                max,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
