//! The Red-Green-Refactor transition table.
//!
//! A pure function of `(phase, outcome)`. It knows nothing about files or
//! storage; callers persist the result through a `CycleStore`.

use crate::types::{Phase, TestOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// red -> green: the new test failed as required.
    RedConfirmed,
    /// red -> red: the test passed, so it proves nothing yet.
    TestDidNotFail,
    /// green -> refactor: implementation satisfies the test.
    Satisfied,
    /// green -> green: still failing.
    StillFailing,
    /// refactor -> green: a previously passing test broke.
    Regression,
    /// refactor -> refactor: still safe.
    StillGreen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub outcome: TestOutcome,
    pub kind: TransitionKind,
    pub message: String,
}

impl Transition {
    pub fn changed_phase(&self) -> bool {
        self.from != self.to
    }
}

/// Compute the next phase and advisory for a classified test run.
pub fn transition(phase: Phase, outcome: TestOutcome) -> Transition {
    use TestOutcome::{Failed, Passed};

    let (to, kind, message) = match (phase, outcome) {
        (Phase::Red, Failed) => (
            Phase::Green,
            TransitionKind::RedConfirmed,
            "RED confirmed: the test fails as required. Phase is now GREEN; \
             write the minimal implementation that makes it pass.",
        ),
        (Phase::Red, Passed) => (
            Phase::Red,
            TransitionKind::TestDidNotFail,
            "Still RED: the tests passed, so nothing proves the new behavior is missing. \
             Write or fix a test that fails before implementing.",
        ),
        (Phase::Green, Passed) => (
            Phase::Refactor,
            TransitionKind::Satisfied,
            "GREEN reached: the implementation satisfies the test. Phase is now REFACTOR; \
             improve the structure while keeping the tests passing.",
        ),
        (Phase::Green, Failed) => (
            Phase::Green,
            TransitionKind::StillFailing,
            "Still GREEN phase: tests are failing. Keep implementing until they pass.",
        ),
        (Phase::Refactor, Failed) => (
            Phase::Green,
            TransitionKind::Regression,
            "Regression: the refactor broke a previously passing test. Phase is back to \
             GREEN; fix the code until the tests pass again.",
        ),
        (Phase::Refactor, Passed) => (
            Phase::Refactor,
            TransitionKind::StillGreen,
            "Tests still pass. It is safe to keep refactoring.",
        ),
    };

    tracing::debug!(from = %phase, to = %to, outcome = %outcome, "cycle transition");

    Transition {
        from: phase,
        to,
        outcome,
        kind,
        message: message.to_string(),
    }
}

/// Extra advisory once GREEN has failed `max_iterations` times in a row.
pub fn iteration_notice(failed_runs_in_green: u32, max_iterations: u32) -> Option<String> {
    if max_iterations == 0 || failed_runs_in_green < max_iterations {
        return None;
    }
    Some(format!(
        "{failed_runs_in_green} consecutive failing runs in GREEN (limit {max_iterations}). \
         Step back: re-read the failing assertion, consider a smaller test, or revisit the approach."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_total_and_matches_policy() {
        let expected = [
            (Phase::Red, TestOutcome::Failed, Phase::Green),
            (Phase::Red, TestOutcome::Passed, Phase::Red),
            (Phase::Green, TestOutcome::Passed, Phase::Refactor),
            (Phase::Green, TestOutcome::Failed, Phase::Green),
            (Phase::Refactor, TestOutcome::Failed, Phase::Green),
            (Phase::Refactor, TestOutcome::Passed, Phase::Refactor),
        ];
        for (from, outcome, to) in expected {
            let t = transition(from, outcome);
            assert_eq!(t.to, to, "{from} + {outcome}");
            assert_eq!(t.from, from);
            assert_eq!(t.outcome, outcome);
            assert!(!t.message.is_empty());
        }
    }

    #[test]
    fn red_failure_says_implementation_may_begin() {
        let t = transition(Phase::Red, TestOutcome::Failed);
        assert_eq!(t.kind, TransitionKind::RedConfirmed);
        assert!(t.message.contains("implementation"));
        assert!(t.changed_phase());
    }

    #[test]
    fn refactor_failure_flags_regression() {
        let t = transition(Phase::Refactor, TestOutcome::Failed);
        assert_eq!(t.kind, TransitionKind::Regression);
        assert!(t.message.contains("Regression"));
    }

    #[test]
    fn red_pass_does_not_move() {
        let t = transition(Phase::Red, TestOutcome::Passed);
        assert_eq!(t.kind, TransitionKind::TestDidNotFail);
        assert!(!t.changed_phase());
    }

    #[test]
    fn iteration_notice_threshold() {
        assert!(iteration_notice(4, 5).is_none());
        assert!(iteration_notice(5, 5).unwrap().contains("Step back"));
        assert!(iteration_notice(50, 0).is_none());
    }
}
