use crate::error::{RedgreenError, Result};
use crate::io;
use crate::paths;
use crate::transition::Transition;
use crate::types::{Phase, TestOutcome};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CycleState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleState {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub test_files_written: BTreeSet<String>,
    #[serde(default)]
    pub tests_ran: bool,
    #[serde(default)]
    pub tests_failed: bool,
    /// Consecutive failing runs while already in GREEN.
    #[serde(default)]
    pub failed_runs_in_green: u32,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent set-add. Returns true if the path was not yet recorded.
    pub fn record_test_file(&mut self, path: &str) -> bool {
        self.test_files_written.insert(path.to_string())
    }

    /// Apply an engine transition and the bookkeeping that goes with it.
    pub fn apply(&mut self, transition: &Transition) {
        self.phase = transition.to;
        self.tests_ran = true;
        self.tests_failed = transition.outcome.is_failed();
        if transition.from == Phase::Green
            && transition.to == Phase::Green
            && transition.outcome == TestOutcome::Failed
        {
            self.failed_runs_in_green = self.failed_runs_in_green.saturating_add(1);
        } else {
            self.failed_runs_in_green = 0;
        }
    }

    /// Start the next RED iteration of the same task, keeping the record of
    /// test files. Allowed from REFACTOR, or from GREEN when the refactor
    /// step is explicitly skipped.
    pub fn begin_next_iteration(&mut self, skip_refactor: bool) -> Result<()> {
        let allowed = match self.phase {
            Phase::Refactor => true,
            Phase::Green => skip_refactor,
            Phase::Red => false,
        };
        if !allowed {
            let reason = match self.phase {
                Phase::Red => "the current test has not failed yet".to_string(),
                _ => "refactor first, or pass --skip-refactor".to_string(),
            };
            return Err(RedgreenError::InvalidTransition {
                from: self.phase.to_string(),
                to: Phase::Red.to_string(),
                reason,
            });
        }
        self.phase = Phase::Red;
        self.tests_ran = false;
        self.tests_failed = false;
        self.failed_runs_in_green = 0;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CycleStore
// ---------------------------------------------------------------------------

/// Storage for the single per-project [`CycleState`].
///
/// `update` is a serialized read-modify-write: a transform that returns an
/// error leaves the stored value untouched.
pub trait CycleStore {
    fn load(&self) -> Result<Option<CycleState>>;

    fn update(
        &self,
        transform: &mut dyn FnMut(&mut CycleState) -> Result<()>,
    ) -> Result<CycleState>;

    fn reset(&self) -> Result<CycleState>;
}

impl<S: CycleStore + ?Sized> CycleStore for &S {
    fn load(&self) -> Result<Option<CycleState>> {
        (**self).load()
    }

    fn update(
        &self,
        transform: &mut dyn FnMut(&mut CycleState) -> Result<()>,
    ) -> Result<CycleState> {
        (**self).update(transform)
    }

    fn reset(&self) -> Result<CycleState> {
        (**self).reset()
    }
}

// ---------------------------------------------------------------------------
// FileCycleStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(50),
        }
    }
}

/// `.redgreen/cycle.json`, guarded by an advisory lock on
/// `.redgreen/cycle.lock`.
#[derive(Debug, Clone)]
pub struct FileCycleStore {
    root: PathBuf,
    lock: LockOptions,
}

/// Held exclusive lock; released when dropped.
struct CycleLock {
    file: File,
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileCycleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: LockOptions::default(),
        }
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn acquire(&self) -> Result<CycleLock> {
        let lock_path = paths::cycle_lock_path(&self.root);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let started = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(CycleLock { file }),
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= self.lock.timeout {
                        return Err(RedgreenError::LockTimeout {
                            path: lock_path.display().to_string(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(self.lock.retry_interval);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read(&self) -> Result<Option<CycleState>> {
        let path = paths::cycle_path(&self.root);
        match io::read_optional(&path)? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn write(&self, state: &CycleState) -> Result<()> {
        let path = paths::cycle_path(&self.root);
        let data = serde_json::to_string_pretty(state)?;
        io::atomic_write(&path, data.as_bytes())
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl CycleStore for FileCycleStore {
    fn load(&self) -> Result<Option<CycleState>> {
        self.read()
    }

    fn update(
        &self,
        transform: &mut dyn FnMut(&mut CycleState) -> Result<()>,
    ) -> Result<CycleState> {
        let _guard = self.acquire()?;
        let mut state = self.read()?.unwrap_or_default();
        transform(&mut state)?;
        self.write(&state)?;
        Ok(state)
    }

    fn reset(&self) -> Result<CycleState> {
        let _guard = self.acquire()?;
        let state = CycleState::new();
        self.write(&state)?;
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// MemoryCycleStore
// ---------------------------------------------------------------------------

/// In-process store with the same contract, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCycleStore {
    inner: Mutex<Option<CycleState>>,
}

impl MemoryCycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: CycleState) -> Self {
        Self {
            inner: Mutex::new(Some(state)),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Option<CycleState>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CycleStore for MemoryCycleStore {
    fn load(&self) -> Result<Option<CycleState>> {
        Ok(self.guard().clone())
    }

    fn update(
        &self,
        transform: &mut dyn FnMut(&mut CycleState) -> Result<()>,
    ) -> Result<CycleState> {
        let mut slot = self.guard();
        let mut state = slot.clone().unwrap_or_default();
        transform(&mut state)?;
        *slot = Some(state.clone());
        Ok(state)
    }

    fn reset(&self) -> Result<CycleState> {
        let state = CycleState::new();
        *self.guard() = Some(state.clone());
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
