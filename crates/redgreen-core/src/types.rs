use crate::error::RedgreenError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Red,
    Green,
    Refactor,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[Phase::Red, Phase::Green, Phase::Refactor]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Red => "red",
            Phase::Green => "green",
            Phase::Refactor => "refactor",
        }
    }

    /// Upper-case label used in agent-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Red => "RED",
            Phase::Green => "GREEN",
            Phase::Refactor => "REFACTOR",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = RedgreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Phase::Red),
            "green" => Ok(Phase::Green),
            "refactor" => Ok(Phase::Refactor),
            _ => Err(RedgreenError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Strictness
// ---------------------------------------------------------------------------

/// Severity applied by the write gate. Ordered from most to least severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    #[default]
    Strict,
    Standard,
    Relaxed,
}

impl Strictness {
    pub fn all() -> &'static [Strictness] {
        &[Strictness::Strict, Strictness::Standard, Strictness::Relaxed]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strictness::Strict => "strict",
            Strictness::Standard => "standard",
            Strictness::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strictness {
    type Err = RedgreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Strictness::Strict),
            "standard" => Ok(Strictness::Standard),
            "relaxed" => Ok(Strictness::Relaxed),
            _ => Err(RedgreenError::InvalidStrictness(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TestOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
}

impl TestOutcome {
    pub fn from_failed(failed: bool) -> Self {
        if failed {
            TestOutcome::Failed
        } else {
            TestOutcome::Passed
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, TestOutcome::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Feature,
    Bug,
    Refactor,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Feature => "feature",
            TaskKind::Bug => "bug",
            TaskKind::Refactor => "refactor",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = RedgreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(TaskKind::Feature),
            "bug" | "bugfix" => Ok(TaskKind::Bug),
            "refactor" => Ok(TaskKind::Refactor),
            _ => Err(RedgreenError::InvalidTaskKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolKind
// ---------------------------------------------------------------------------

/// The host tool attempting a file mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Write,
    Edit,
    MultiEdit,
    NotebookEdit,
    Other(String),
}

impl ToolKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "Write" => ToolKind::Write,
            "Edit" => ToolKind::Edit,
            "MultiEdit" => ToolKind::MultiEdit,
            "NotebookEdit" => ToolKind::NotebookEdit,
            other => ToolKind::Other(other.to_string()),
        }
    }

    /// Whether this tool mutates files and therefore passes through the gate.
    pub fn is_write(&self) -> bool {
        !matches!(self, ToolKind::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ToolKind::Write => "Write",
            ToolKind::Edit => "Edit",
            ToolKind::MultiEdit => "MultiEdit",
            ToolKind::NotebookEdit => "NotebookEdit",
            ToolKind::Other(name) => name,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_roundtrip_str() {
        for p in Phase::all() {
            let parsed: Phase = p.as_str().parse().unwrap();
            assert_eq!(parsed, *p);
        }
        assert!("blue".parse::<Phase>().is_err());
    }

    #[test]
    fn phase_defaults_to_red() {
        assert_eq!(Phase::default(), Phase::Red);
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Refactor).unwrap(), "\"refactor\"");
    }

    #[test]
    fn strictness_ordering_most_severe_first() {
        assert!(Strictness::Strict < Strictness::Standard);
        assert!(Strictness::Standard < Strictness::Relaxed);
    }

    #[test]
    fn strictness_parse_is_case_insensitive() {
        assert_eq!("STRICT".parse::<Strictness>().unwrap(), Strictness::Strict);
        assert_eq!(" relaxed ".parse::<Strictness>().unwrap(), Strictness::Relaxed);
        assert!("lenient".parse::<Strictness>().is_err());
    }

    #[test]
    fn tool_kind_write_detection() {
        assert!(ToolKind::parse("Edit").is_write());
        assert!(ToolKind::parse("MultiEdit").is_write());
        assert!(!ToolKind::parse("Bash").is_write());
        assert_eq!(ToolKind::parse("Read").as_str(), "Read");
    }

    #[test]
    fn task_kind_accepts_bugfix_alias() {
        assert_eq!("bugfix".parse::<TaskKind>().unwrap(), TaskKind::Bug);
    }
}
