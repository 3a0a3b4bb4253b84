use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const REDGREEN_DIR: &str = ".redgreen";
pub const MODE_FILE: &str = ".redgreen/mode.json";
pub const CYCLE_FILE: &str = ".redgreen/cycle.json";
pub const CYCLE_LOCK_FILE: &str = ".redgreen/cycle.lock";
pub const SETTINGS_FILE: &str = ".redgreen/settings.md";

/// Host agent configuration directory; never subject to enforcement.
pub const CLAUDE_DIR: &str = ".claude";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn redgreen_dir(root: &Path) -> PathBuf {
    root.join(REDGREEN_DIR)
}

pub fn mode_path(root: &Path) -> PathBuf {
    root.join(MODE_FILE)
}

pub fn cycle_path(root: &Path) -> PathBuf {
    root.join(CYCLE_FILE)
}

pub fn cycle_lock_path(root: &Path) -> PathBuf {
    root.join(CYCLE_LOCK_FILE)
}

pub fn project_settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

/// `~/.redgreen/settings.md`, or `None` when no home directory is known.
pub fn global_settings_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(SETTINGS_FILE))
}

// ---------------------------------------------------------------------------
// Candidate path normalisation
// ---------------------------------------------------------------------------

/// Resolve `root` to its canonical absolute form so that candidate paths
/// reported by the host strip cleanly. Falls back to a lexically absolute
/// path when the directory does not exist.
pub fn canonical_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root)
        .or_else(|_| std::path::absolute(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

/// Canonicalise the longest existing ancestor of `path` and re-append the
/// rest. The file a write targets usually does not exist yet.
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    path.ancestors().find_map(|dir| {
        let real = std::fs::canonicalize(dir).ok()?;
        let tail = path.strip_prefix(dir).ok()?;
        Some(if tail.as_os_str().is_empty() {
            real
        } else {
            real.join(tail)
        })
    })
}

/// Normalise a path reported by the host into the project-relative,
/// forward-slash form the classifier matches against.
///
/// Absolute paths under `root` are made relative, comparing canonical forms
/// when the literal prefix does not match (relative or symlinked roots).
/// Absolute paths elsewhere are kept as-is (with separators normalised).
pub fn normalize_candidate(root: &Path, raw: &str) -> String {
    let candidate = Path::new(raw);
    let rel: PathBuf = if candidate.is_absolute() {
        relative_to_root(root, candidate).unwrap_or_else(|| candidate.to_path_buf())
    } else {
        candidate.to_path_buf()
    };
    let mut s = rel.to_string_lossy().replace('\\', "/");
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    s
}

fn relative_to_root(root: &Path, candidate: &Path) -> Option<PathBuf> {
    if let Ok(rel) = candidate.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }
    let real_root = canonical_root(root);
    if let Ok(rel) = candidate.strip_prefix(&real_root) {
        return Some(rel.to_path_buf());
    }
    let real_candidate = canonicalize_existing(candidate)?;
    real_candidate
        .strip_prefix(&real_root)
        .ok()
        .map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
