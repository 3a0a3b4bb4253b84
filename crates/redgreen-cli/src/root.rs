use redgreen_core::paths::{canonical_root, REDGREEN_DIR};
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `REDGREEN_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.redgreen/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
///
/// The result is canonical, so absolute paths from the host strip against it.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return canonical_root(p);
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let found = find_upward(&cwd, REDGREEN_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd);
    canonical_root(&found)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn explicit_root_is_canonicalised() {
        let dir = TempDir::new().unwrap();
        let proj = dir.path().join("tests/proj");
        std::fs::create_dir_all(&proj).unwrap();
        let result = resolve_root(Some(&proj.join("../proj")));
        assert!(result.is_absolute());
        assert_eq!(result, std::fs::canonicalize(&proj).unwrap());
    }

    #[test]
    fn nearest_marker_dir_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("pkg");
        std::fs::create_dir_all(nested.join(REDGREEN_DIR)).unwrap();
        let deep = nested.join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_upward(&deep, REDGREEN_DIR), Some(nested));
        assert_eq!(find_upward(&deep, ".git"), Some(dir.path().to_path_buf()));
        assert_eq!(find_upward(&deep, ".hg"), None);
    }
}
