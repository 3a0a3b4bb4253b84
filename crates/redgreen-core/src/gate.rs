use crate::classifier::FileClass;
use crate::mode::ModeConfig;
use crate::state::CycleState;
use crate::types::{Phase, Strictness, ToolKind};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CycleSnapshot
// ---------------------------------------------------------------------------

/// What the gate knows about the cycle at decision time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleSnapshot {
    /// No cycle has been started.
    Absent,
    /// A cycle file exists but could not be read.
    Unknown,
    Present(CycleState),
}

impl CycleSnapshot {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            CycleSnapshot::Present(s) => Some(s.phase),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// GateDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Warn {
        message: String,
    },
    Block {
        message: String,
    },
}

impl GateDecision {
    pub fn allow() -> Self {
        GateDecision::Allow { note: None }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, GateDecision::Block { .. })
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, GateDecision::Allow { .. })
    }

    /// Text to surface to the agent, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            GateDecision::Allow { note } => note.as_deref(),
            GateDecision::Warn { message } | GateDecision::Block { message } => Some(message),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Allow { .. } => "allow",
            GateDecision::Warn { .. } => "warn",
            GateDecision::Block { .. } => "block",
        }
    }
}

// ---------------------------------------------------------------------------
// decide
// ---------------------------------------------------------------------------

/// Decide whether a file mutation may proceed.
///
/// `mode` is `None` when TDD mode is inactive. The gate is pure; recording
/// written test files is the caller's job.
pub fn decide(
    path: &str,
    tool: &ToolKind,
    mode: Option<&ModeConfig>,
    cycle: &CycleSnapshot,
    class: FileClass,
) -> GateDecision {
    let Some(mode) = mode.filter(|m| m.active) else {
        return GateDecision::allow();
    };

    match class {
        FileClass::TestFile | FileClass::NonSource => return GateDecision::allow(),
        FileClass::Source => {}
    }

    let strictness = mode.strictness;
    let decision = match cycle {
        CycleSnapshot::Present(state) => match state.phase {
            Phase::Green | Phase::Refactor => GateDecision::allow(),
            Phase::Red => red_phase(path, tool, strictness),
        },
        CycleSnapshot::Absent => match strictness {
            Strictness::Strict => GateDecision::Block {
                message: format!(
                    "TDD (strict): no TDD cycle has been started, so {tool} of {path} is not allowed. \
                     Start a task first with `redgreen start feature <description>` \
                     (or `bug` / `refactor`), then write a failing test."
                ),
            },
            Strictness::Standard | Strictness::Relaxed => GateDecision::allow(),
        },
        CycleSnapshot::Unknown => match strictness {
            Strictness::Strict => GateDecision::Block {
                message: format!(
                    "TDD (strict): the cycle state could not be read, so the current phase is unknown \
                     and {tool} of {path} is refused. Check `redgreen status`, or run `redgreen reset` \
                     and begin again with a failing test."
                ),
            },
            Strictness::Standard | Strictness::Relaxed => GateDecision::allow(),
        },
    };

    tracing::debug!(path, %tool, %strictness, decision = decision.label(), "write gate");
    decision
}

fn red_phase(path: &str, tool: &ToolKind, strictness: Strictness) -> GateDecision {
    match strictness {
        Strictness::Strict => GateDecision::Block {
            message: format!(
                "TDD (strict): phase is RED, so {tool} of source file {path} is blocked. \
                 Write a failing test, run it, and confirm it fails before implementing."
            ),
        },
        Strictness::Standard => GateDecision::Warn {
            message: format!(
                "TDD (standard): phase is RED and no failing test has been confirmed yet, \
                 but {path} is being changed. Write a test, run it, and watch it fail first."
            ),
        },
        Strictness::Relaxed => GateDecision::Allow {
            note: Some(format!(
                "TDD tip: no failing test has been confirmed yet. Consider writing one that \
                 describes the change to {path} and running it before implementing."
            )),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
