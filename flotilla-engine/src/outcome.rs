//! Per-repository result records.

use std::fmt;

use serde::Serialize;

/// What a dispatched operation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Cloned,
    Fetched,
    Pulled,
    Skipped,
    Failed,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Cloned => "cloned",
            Action::Fetched => "fetched",
            Action::Pulled => "pulled",
            Action::Skipped => "skipped",
            Action::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One record per repository per dispatcher run. Immutable once built.
///
/// The constructors keep the record consistent: `skipped` is always a
/// success, `failed` never is, and only `fetched`/`pulled` carry counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    name: String,
    action: Action,
    success: bool,
    ahead: u32,
    behind: u32,
    message: String,
}

impl TaskOutcome {
    fn build(name: impl Into<String>, action: Action, success: bool, message: String) -> Self {
        Self {
            name: name.into(),
            action,
            success,
            ahead: 0,
            behind: 0,
            message,
        }
    }

    pub fn cloned(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(name, Action::Cloned, true, message.into())
    }

    pub fn fetched(name: impl Into<String>, ahead: u32, behind: u32) -> Self {
        Self {
            ahead,
            behind,
            ..Self::build(name, Action::Fetched, true, String::new())
        }
    }

    pub fn pulled(name: impl Into<String>, ahead: u32, behind: u32) -> Self {
        Self {
            ahead,
            behind,
            ..Self::build(
                name,
                Action::Pulled,
                true,
                format!("fast-forwarded {behind} commit(s)"),
            )
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::build(name, Action::Skipped, true, reason.into())
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(name, Action::Failed, false, message.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn ahead(&self) -> u32 {
        self.ahead
    }

    pub fn behind(&self) -> u32 {
        self.behind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Success/failure totals over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    pub fn of(outcomes: &[TaskOutcome]) -> Self {
        outcomes.iter().fold(Tally::default(), |mut t, o| {
            match (o.action, o.success) {
                (Action::Skipped, _) => t.skipped += 1,
                (_, true) => t.succeeded += 1,
                (_, false) => t.failed += 1,
            }
            t
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_is_success() {
        let o = TaskOutcome::skipped("api", "Working tree has uncommitted changes");
        assert!(o.success());
        assert_eq!(o.action(), Action::Skipped);
        assert_eq!((o.ahead(), o.behind()), (0, 0));
    }

    #[test]
    fn failed_is_never_success() {
        let o = TaskOutcome::failed("api", "Fetch failed");
        assert!(!o.success());
        assert_eq!((o.ahead(), o.behind()), (0, 0));
    }

    #[test]
    fn serializes_lowercase_action() {
        let json = serde_json::to_value(TaskOutcome::fetched("api", 1, 2)).unwrap();
        assert_eq!(json["action"], "fetched");
        assert_eq!(json["behind"], 2);
    }

    #[test]
    fn tally_counts_by_kind() {
        let outcomes = vec![
            TaskOutcome::pulled("a", 0, 3),
            TaskOutcome::skipped("b", "dirty"),
            TaskOutcome::failed("c", "boom"),
            TaskOutcome::cloned("d", "ok"),
        ];
        assert_eq!(
            Tally::of(&outcomes),
            Tally {
                succeeded: 2,
                skipped: 1,
                failed: 1
            }
        );
    }
}
