//! Host event handlers.
//!
//! [`Enforcer`] wires the classifiers, the gate and the transition engine to
//! an injected [`CycleStore`]. None of its entry points return errors:
//! storage failures degrade according to the [`FailPolicy`].

use crate::classifier::{FileClass, FileClassifier};
use crate::error::RedgreenError;
use crate::gate::{self, CycleSnapshot, GateDecision};
use crate::lifecycle::StatusReport;
use crate::mode::ModeConfig;
use crate::outcome::{CommandOutcome, OutcomeClassifier, RunnerTable, TestRun};
use crate::paths;
use crate::policy::{FailPolicy, LockTimeout};
use crate::settings::Settings;
use crate::state::CycleStore;
use crate::transition::{self, Transition};
use crate::types::{Strictness, ToolKind};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Dry-run result for a command, as `check command` reports it.
#[derive(Debug, Clone, Serialize)]
pub struct CommandPreview {
    pub outcome: CommandOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

pub struct Enforcer<S> {
    root: PathBuf,
    store: S,
    mode: Option<ModeConfig>,
    settings: Settings,
    policy: FailPolicy,
    files: FileClassifier,
    commands: OutcomeClassifier<RunnerTable>,
}

impl<S: CycleStore> Enforcer<S> {
    /// `mode` is the active mode flag, or `None` when TDD mode is off.
    pub fn new(
        root: impl Into<PathBuf>,
        store: S,
        mode: Option<ModeConfig>,
        settings: Settings,
    ) -> Self {
        let policy = settings.policy();
        let mut table = RunnerTable::from_settings(&settings);
        if let Some(cmd) = mode.as_ref().and_then(|m| m.test_command.as_deref()) {
            table = table.with_command_prefix(cmd);
        }
        Self {
            root: paths::canonical_root(&root.into()),
            files: FileClassifier::from_settings(&settings),
            commands: OutcomeClassifier::new(table, policy),
            store,
            mode: mode.filter(|m| m.active),
            settings,
            policy,
        }
    }

    /// Per-invocation strictness override.
    pub fn with_strictness(mut self, strictness: Option<Strictness>) -> Self {
        if let (Some(mode), Some(s)) = (self.mode.as_mut(), strictness) {
            mode.strictness = s;
        }
        self
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_some()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> Option<&ModeConfig> {
        self.mode.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Normalise a host path and classify it.
    pub fn classify_path(&self, raw: &str) -> (String, FileClass) {
        let path = paths::normalize_candidate(&self.root, raw);
        let class = self.files.classify(&path);
        (path, class)
    }

    pub fn snapshot(&self) -> CycleSnapshot {
        match self.store.load() {
            Ok(Some(state)) => CycleSnapshot::Present(state),
            Ok(None) => CycleSnapshot::Absent,
            Err(e) => {
                tracing::warn!(error = %e, "cycle state unreadable");
                CycleSnapshot::Unknown
            }
        }
    }

    // -----------------------------------------------------------------------
    // OnBeforeWrite
    // -----------------------------------------------------------------------

    /// Decide on a file mutation. Test files written into an existing cycle
    /// are recorded.
    pub fn on_before_write(&self, raw_path: &str, tool: &ToolKind) -> GateDecision {
        if !tool.is_write() || !self.is_active() {
            return GateDecision::allow();
        }
        let (path, class) = self.classify_path(raw_path);
        let snapshot = self.snapshot();
        let decision = gate::decide(&path, tool, self.mode.as_ref(), &snapshot, class);

        if class == FileClass::TestFile && matches!(snapshot, CycleSnapshot::Present(_)) {
            let recorded = self.store.update(&mut |s| {
                s.record_test_file(&path);
                Ok(())
            });
            if let Err(e) = recorded {
                self.degraded("record test file", &e);
            }
        }
        decision
    }

    // -----------------------------------------------------------------------
    // OnAfterCommandExecution
    // -----------------------------------------------------------------------

    /// Classify a finished command and, for a test run, advance the cycle.
    /// Returns the advisory for the agent.
    pub fn on_after_command(
        &self,
        command: &str,
        exit_code: Option<i32>,
        output: Option<&str>,
    ) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        let run = match self.commands.classify(command, exit_code, output) {
            CommandOutcome::NotATest => return None,
            CommandOutcome::TestRun(run) => run,
        };

        let mut applied: Option<Transition> = None;
        let updated = self.store.update(&mut |s| {
            let t = transition::transition(s.phase, run.outcome);
            s.apply(&t);
            applied = Some(t);
            Ok(())
        });

        match (updated, applied) {
            (Ok(state), Some(t)) => {
                tracing::info!(from = %t.from, to = %t.to, runner = %run.runner, "test run recorded");
                let mut advisory = format!("[TDD] {}", t.message);
                if let Some(notice) = transition::iteration_notice(
                    state.failed_runs_in_green,
                    self.settings.max_iterations,
                ) {
                    advisory.push(' ');
                    advisory.push_str(&notice);
                }
                Some(advisory)
            }
            (Ok(_), None) => None,
            (Err(e), _) => {
                self.degraded("apply test outcome", &e);
                None
            }
        }
    }

    /// What `on_after_command` would do, without touching the store.
    pub fn preview_command(
        &self,
        command: &str,
        exit_code: Option<i32>,
        output: Option<&str>,
    ) -> CommandPreview {
        let outcome = self.commands.classify(command, exit_code, output);
        let transition = match (&outcome, self.snapshot()) {
            (CommandOutcome::TestRun(TestRun { outcome: o, .. }), CycleSnapshot::Present(s)) => {
                Some(transition::transition(s.phase, *o))
            }
            (CommandOutcome::TestRun(TestRun { outcome: o, .. }), CycleSnapshot::Absent) => {
                Some(transition::transition(Default::default(), *o))
            }
            _ => None,
        };
        CommandPreview {
            outcome,
            transition,
        }
    }

    // -----------------------------------------------------------------------
    // OnUserTurnStart
    // -----------------------------------------------------------------------

    pub fn on_user_turn_start(&self) -> Option<String> {
        let mode = self.mode.as_ref()?;
        Some(StatusReport::build(Some(mode), &self.snapshot()).summary())
    }

    fn degraded(&self, action: &str, err: &RedgreenError) {
        match err {
            RedgreenError::LockTimeout { .. } => match self.policy.on_lock_timeout {
                LockTimeout::SkipUpdate => {
                    tracing::warn!(error = %err, action, "cycle lock busy; update skipped")
                }
            },
            _ => tracing::warn!(error = %err, action, "cycle update failed; state left as-is"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CycleState, FileCycleStore, LockOptions, MemoryCycleStore};
    use crate::types::Phase;
    use fs2::FileExt;
    use std::time::Duration;
    use tempfile::TempDir;

    fn active(strictness: Strictness) -> Option<ModeConfig> {
        Some(ModeConfig::activate(strictness, None, None))
    }

    fn enforcer(phase: Option<Phase>, strictness: Strictness) -> Enforcer<MemoryCycleStore> {
        let store = match phase {
            Some(p) => MemoryCycleStore::with_state(CycleState {
                phase: p,
                ..Default::default()
            }),
            None => MemoryCycleStore::new(),
        };
        Enforcer::new("/proj", store, active(strictness), Settings::default())
    }

    fn phase_of(e: &Enforcer<MemoryCycleStore>) -> Phase {
        e.store().load().unwrap().unwrap().phase
    }

    #[test]
    fn strict_red_blocks_source_write() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        assert!(e.on_before_write("src/app.ts", &ToolKind::Write).is_block());
    }

    #[test]
    fn test_file_write_is_allowed_and_recorded() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        let d = e.on_before_write("/proj/src/app.test.ts", &ToolKind::Write);
        assert!(d.is_allow());
        let state = e.store().load().unwrap().unwrap();
        assert!(state.test_files_written.contains("src/app.test.ts"));

        e.on_before_write("src/app.test.ts", &ToolKind::Edit);
        assert_eq!(e.store().load().unwrap().unwrap().test_files_written.len(), 1);
    }

    #[test]
    fn test_file_write_does_not_start_a_cycle() {
        let e = enforcer(None, Strictness::Strict);
        assert!(e.on_before_write("src/app.test.ts", &ToolKind::Write).is_allow());
        assert!(e.store().load().unwrap().is_none());
    }

    #[test]
    fn non_write_tools_pass_through() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        assert!(e.on_before_write("src/app.ts", &ToolKind::parse("Read")).is_allow());
    }

    #[test]
    fn inactive_mode_is_a_no_op() {
        let store = MemoryCycleStore::with_state(CycleState::new());
        let e = Enforcer::new("/proj", store, None, Settings::default());
        assert!(e.on_before_write("src/app.ts", &ToolKind::Write).is_allow());
        assert!(e.on_after_command("pytest", Some(1), None).is_none());
        assert!(e.on_user_turn_start().is_none());
        assert_eq!(phase_of(&e), Phase::Red);
    }

    #[test]
    fn strictness_override_applies_per_invocation() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict).with_strictness(Some(Strictness::Relaxed));
        let d = e.on_before_write("src/app.ts", &ToolKind::Write);
        assert!(d.is_allow());
        assert!(d.message().is_some());
    }

    #[test]
    fn failing_test_in_red_moves_to_green() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        let advisory = e.on_after_command("pytest", Some(1), None).unwrap();
        assert!(advisory.contains("implementation"));
        assert_eq!(phase_of(&e), Phase::Green);
        let state = e.store().load().unwrap().unwrap();
        assert!(state.tests_ran);
        assert!(state.tests_failed);
        // source writes are now allowed
        assert!(e.on_before_write("src/app.py", &ToolKind::Edit).is_allow());
    }

    #[test]
    fn passing_test_in_green_moves_to_refactor() {
        let e = enforcer(Some(Phase::Green), Strictness::Strict);
        e.on_after_command("pytest", Some(0), None).unwrap();
        assert_eq!(phase_of(&e), Phase::Refactor);
    }

    #[test]
    fn refactor_regression_returns_to_green() {
        let e = enforcer(Some(Phase::Refactor), Strictness::Strict);
        let advisory = e.on_after_command("npm test", Some(2), None).unwrap();
        assert!(advisory.contains("Regression"));
        assert_eq!(phase_of(&e), Phase::Green);
    }

    #[test]
    fn non_test_command_changes_nothing() {
        for phase in Phase::all() {
            let e = enforcer(Some(*phase), Strictness::Strict);
            assert!(e.on_after_command("echo hello", Some(1), None).is_none());
            let state = e.store().load().unwrap().unwrap();
            assert_eq!(state.phase, *phase);
            assert!(!state.tests_ran);
        }
    }

    #[test]
    fn quoted_separators_do_not_look_like_test_runs() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        let commit = r#"git commit -m "fix flaky; go test ./... now green""#;
        assert!(e.on_after_command(commit, Some(1), None).is_none());
        assert_eq!(phase_of(&e), Phase::Red);
    }

    #[test]
    fn non_canonical_root_under_tests_dir_still_blocks() {
        let dir = TempDir::new().unwrap();
        let proj = dir.path().join("tests/proj");
        std::fs::create_dir_all(proj.join("src")).unwrap();
        let store = MemoryCycleStore::with_state(CycleState::default());
        let e = Enforcer::new(
            proj.join("../proj"),
            store,
            active(Strictness::Strict),
            Settings::default(),
        );
        let target = std::fs::canonicalize(&proj).unwrap().join("src/app.ts");
        let decision = e.on_before_write(target.to_str().unwrap(), &ToolKind::Write);
        assert!(decision.is_block(), "{decision:?}");
    }

    #[test]
    fn output_heuristics_drive_transition_without_exit_code() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        e.on_after_command("npx jest", None, Some("FAIL src/app.test.ts"))
            .unwrap();
        assert_eq!(phase_of(&e), Phase::Green);
    }

    #[test]
    fn configured_test_command_from_mode_is_recognised() {
        let store = MemoryCycleStore::with_state(CycleState::new());
        let mode = ModeConfig::activate(Strictness::Strict, Some("./run-checks".to_string()), None);
        let e = Enforcer::new("/proj", store, Some(mode), Settings::default());
        e.on_after_command("./run-checks --all", Some(1), None).unwrap();
        assert_eq!(phase_of(&e), Phase::Green);
    }

    #[test]
    fn repeated_green_failures_add_step_back_notice() {
        let settings = Settings {
            max_iterations: 2,
            ..Settings::default()
        };
        let store = MemoryCycleStore::with_state(CycleState {
            phase: Phase::Green,
            ..Default::default()
        });
        let e = Enforcer::new("/proj", store, active(Strictness::Strict), settings);
        let first = e.on_after_command("go test ./...", Some(1), None).unwrap();
        assert!(!first.contains("Step back"));
        let second = e.on_after_command("go test ./...", Some(1), None).unwrap();
        assert!(second.contains("Step back"));
    }

    #[test]
    fn user_turn_status_reports_phase() {
        let e = enforcer(Some(Phase::Refactor), Strictness::Standard);
        let status = e.on_user_turn_start().unwrap();
        assert!(status.contains("standard"));
        assert!(status.contains("REFACTOR"));
    }

    #[test]
    fn preview_does_not_mutate() {
        let e = enforcer(Some(Phase::Red), Strictness::Strict);
        let preview = e.preview_command("pytest", Some(1), None);
        assert_eq!(preview.transition.unwrap().to, Phase::Green);
        assert_eq!(phase_of(&e), Phase::Red);

        let none = e.preview_command("ls", Some(0), None);
        assert_eq!(none.outcome, CommandOutcome::NotATest);
        assert!(none.transition.is_none());
    }

    #[test]
    fn unreadable_cycle_blocks_strict_and_allows_standard() {
        let dir = TempDir::new().unwrap();
        let path = paths::cycle_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "garbage").unwrap();

        let strict = Enforcer::new(
            dir.path(),
            FileCycleStore::new(dir.path()),
            active(Strictness::Strict),
            Settings::default(),
        );
        assert!(strict.on_before_write("src/main.rs", &ToolKind::Write).is_block());
        // the failed update must not replace the unreadable file
        assert!(strict.on_after_command("cargo test", Some(1), None).is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");

        let standard = Enforcer::new(
            dir.path(),
            FileCycleStore::new(dir.path()),
            active(Strictness::Standard),
            Settings::default(),
        );
        assert!(standard.on_before_write("src/main.rs", &ToolKind::Write).is_allow());
    }

    #[test]
    fn lock_timeout_drops_transition() {
        let dir = TempDir::new().unwrap();
        let store = FileCycleStore::new(dir.path()).with_lock_options(LockOptions {
            timeout: Duration::from_millis(80),
            retry_interval: Duration::from_millis(20),
        });
        store.reset().unwrap();
        let holder = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(paths::cycle_lock_path(dir.path()))
            .unwrap();
        FileExt::lock_exclusive(&holder).unwrap();

        let e = Enforcer::new(dir.path(), &store, active(Strictness::Strict), Settings::default());
        assert!(e.on_after_command("pytest", Some(1), None).is_none());
        assert_eq!(store.load().unwrap().unwrap().phase, Phase::Red);
        FileExt::unlock(&holder).unwrap();
    }
}
