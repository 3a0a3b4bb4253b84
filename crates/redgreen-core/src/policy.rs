//! Degraded-path defaults, gathered in one place.
//!
//! Every branch of the enforcement core that hits missing, unreadable or
//! ambiguous input consults a [`FailPolicy`] instead of choosing its own
//! fallback.

use crate::types::TestOutcome;
use serde::{Deserialize, Serialize};

/// What to do when the mode file is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingConfig {
    /// Treat the project as having TDD mode switched off.
    Inactive,
}

/// What to do when the cycle lock cannot be acquired in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTimeout {
    /// Drop the pending mutation; the stored state stays authoritative.
    SkipUpdate,
}

/// What a recognised test run with no exit code and no marker means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousOutcome {
    #[default]
    #[serde(alias = "assume_pass")]
    Pass,
    #[serde(alias = "assume_fail")]
    Fail,
}

impl AmbiguousOutcome {
    pub fn outcome(self) -> TestOutcome {
        match self {
            AmbiguousOutcome::Pass => TestOutcome::Passed,
            AmbiguousOutcome::Fail => TestOutcome::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AmbiguousOutcome::Pass => "pass",
            AmbiguousOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPolicy {
    pub on_missing_config: MissingConfig,
    pub on_lock_timeout: LockTimeout,
    pub on_ambiguous_output: AmbiguousOutcome,
}

impl Default for FailPolicy {
    fn default() -> Self {
        Self {
            on_missing_config: MissingConfig::Inactive,
            on_lock_timeout: LockTimeout::SkipUpdate,
            on_ambiguous_output: AmbiguousOutcome::Pass,
        }
    }
}

impl FailPolicy {
    pub fn with_ambiguous_output(mut self, ambiguous: AmbiguousOutcome) -> Self {
        self.on_ambiguous_output = ambiguous;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_open() {
        let p = FailPolicy::default();
        assert_eq!(p.on_missing_config, MissingConfig::Inactive);
        assert_eq!(p.on_lock_timeout, LockTimeout::SkipUpdate);
        assert_eq!(p.on_ambiguous_output.outcome(), TestOutcome::Passed);
    }

    #[test]
    fn ambiguous_fail_closed_override() {
        let p = FailPolicy::default().with_ambiguous_output(AmbiguousOutcome::Fail);
        assert_eq!(p.on_ambiguous_output.outcome(), TestOutcome::Failed);
    }

    #[test]
    fn ambiguous_outcome_parses_yaml_aliases() {
        let a: AmbiguousOutcome = serde_yaml::from_str("assume_fail").unwrap();
        assert_eq!(a, AmbiguousOutcome::Fail);
        let b: AmbiguousOutcome = serde_yaml::from_str("pass").unwrap();
        assert_eq!(b, AmbiguousOutcome::Pass);
    }
}
