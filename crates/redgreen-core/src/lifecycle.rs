//! Session-level controls: start, stop, advance and report on a cycle.

use crate::error::{RedgreenError, Result};
use crate::gate::CycleSnapshot;
use crate::mode::{ModeConfig, TaskInfo};
use crate::settings::Settings;
use crate::state::{CycleState, CycleStore};
use crate::types::Strictness;
use serde::Serialize;
use std::path::Path;

/// Reset the cycle and switch TDD mode on with the resolved settings.
///
/// The cycle is reset before the mode flag is written so that a hook
/// observing the new flag never sees the previous task's phase.
pub fn start_cycle<S: CycleStore>(
    root: &Path,
    store: &S,
    settings: &Settings,
    task: Option<TaskInfo>,
) -> Result<(ModeConfig, CycleState)> {
    let state = store.reset()?;
    let mode = ModeConfig::activate(settings.strictness, settings.test_command.clone(), task);
    mode.save(root)?;
    tracing::info!(strictness = %mode.strictness, "TDD cycle started");
    Ok((mode, state))
}

/// Switch TDD mode off. The cycle file is left in place.
pub fn stop_cycle(root: &Path) -> Result<bool> {
    let removed = ModeConfig::deactivate(root)?;
    tracing::info!(removed, "TDD mode stopped");
    Ok(removed)
}

/// Reset the cycle to a fresh RED state without touching the mode flag.
pub fn reset_cycle<S: CycleStore>(store: &S) -> Result<CycleState> {
    store.reset()
}

/// Begin the next RED iteration of the current task.
pub fn next_iteration<S: CycleStore>(store: &S, skip_refactor: bool) -> Result<CycleState> {
    if store.load()?.is_none() {
        return Err(RedgreenError::NoCycle);
    }
    store.update(&mut |s| s.begin_next_iteration(skip_refactor))
}

// ---------------------------------------------------------------------------
// StatusReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strictness: Option<Strictness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleState>,
    pub cycle_readable: bool,
}

impl StatusReport {
    pub fn build(mode: Option<&ModeConfig>, snapshot: &CycleSnapshot) -> Self {
        let (cycle, cycle_readable) = match snapshot {
            CycleSnapshot::Present(s) => (Some(s.clone()), true),
            CycleSnapshot::Absent => (None, true),
            CycleSnapshot::Unknown => (None, false),
        };
        Self {
            active: mode.is_some_and(|m| m.active),
            strictness: mode.map(|m| m.strictness),
            task: mode.and_then(|m| m.task.clone()),
            cycle,
            cycle_readable,
        }
    }

    /// One-line status for injection into the agent's context.
    pub fn summary(&self) -> String {
        if !self.active {
            return "TDD mode is off.".to_string();
        }
        let strictness = self.strictness.unwrap_or_default();
        let mut line = format!("TDD mode active ({strictness})");
        if let Some(task) = &self.task {
            if task.description.is_empty() {
                line.push_str(&format!(" · {}", task.kind));
            } else {
                line.push_str(&format!(" · {}: {}", task.kind, task.description));
            }
        }
        match &self.cycle {
            Some(c) => {
                line.push_str(&format!(" · phase: {}", c.phase.label()));
                let ran = if !c.tests_ran {
                    "not run yet"
                } else if c.tests_failed {
                    "last run failed"
                } else {
                    "last run passed"
                };
                line.push_str(&format!(" · tests: {ran}"));
                if !c.test_files_written.is_empty() {
                    line.push_str(&format!(
                        " · {} test file(s) written",
                        c.test_files_written.len()
                    ));
                }
            }
            None if self.cycle_readable => {
                line.push_str(" · no cycle started (run `redgreen start feature <description>`)")
            }
            None => line.push_str(" · cycle state unreadable (run `redgreen reset`)"),
        }
        line
    }
}
