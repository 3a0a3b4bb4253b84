use crate::error::Result;
use crate::io;
use crate::paths;
use crate::policy::{FailPolicy, MissingConfig};
use crate::types::{Strictness, TaskKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub kind: TaskKind,
    #[serde(default)]
    pub description: String,
}

/// The per-project "TDD mode is on" flag and its session parameters.
///
/// Written by start-cycle, deleted by stop-cycle, read-only otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeConfig {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub strictness: Strictness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfo>,
}

impl ModeConfig {
    pub fn activate(
        strictness: Strictness,
        test_command: Option<String>,
        task: Option<TaskInfo>,
    ) -> Self {
        Self {
            active: true,
            activated_at: Some(Utc::now()),
            strictness,
            test_command,
            task,
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Option<Self>> {
        match io::read_optional(&paths::mode_path(root))? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// The active mode, or `None` when the flag is missing, unreadable,
    /// malformed or switched off.
    pub fn load_active(root: &Path) -> Option<Self> {
        Self::load_with_policy(root, &FailPolicy::default())
    }

    pub fn load_with_policy(root: &Path, policy: &FailPolicy) -> Option<Self> {
        match Self::load(root) {
            Ok(Some(mode)) if mode.active => Some(mode),
            Ok(_) => None,
            Err(e) => match policy.on_missing_config {
                MissingConfig::Inactive => {
                    tracing::warn!(error = %e, "mode file unreadable; treating TDD mode as inactive");
                    None
                }
            },
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        io::atomic_write(&paths::mode_path(root), data.as_bytes())
    }

    /// Delete the mode flag. Returns true if it existed.
    pub fn deactivate(root: &Path) -> Result<bool> {
        io::remove_if_exists(&paths::mode_path(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_active() {
        let dir = TempDir::new().unwrap();
        let mode = ModeConfig::activate(
            Strictness::Standard,
            Some("npm test".to_string()),
            Some(TaskInfo {
                kind: TaskKind::Feature,
                description: "login form".to_string(),
            }),
        );
        mode.save(dir.path()).unwrap();
        assert_eq!(ModeConfig::load_active(dir.path()), Some(mode));
    }

    #[test]
    fn json_shape_matches_wire_format() {
        let dir = TempDir::new().unwrap();
        ModeConfig::activate(Strictness::Strict, Some("pytest".to_string()), None)
            .save(dir.path())
            .unwrap();
        let raw = std::fs::read_to_string(paths::mode_path(dir.path())).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["active"], true);
        assert_eq!(v["strictness"], "strict");
        assert_eq!(v["testCommand"], "pytest");
        assert!(v["activatedAt"].is_string());
    }

    #[test]
    fn missing_file_is_inactive() {
        let dir = TempDir::new().unwrap();
        assert!(ModeConfig::load_active(dir.path()).is_none());
    }

    #[test]
    fn malformed_file_is_inactive() {
        let dir = TempDir::new().unwrap();
        let path = paths::mode_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"active\": tru").unwrap();
        assert!(ModeConfig::load_active(dir.path()).is_none());
    }

    #[test]
    fn inactive_flag_is_inactive() {
        let dir = TempDir::new().unwrap();
        let path = paths::mode_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"active": false, "strictness": "relaxed"}"#).unwrap();
        assert!(ModeConfig::load_active(dir.path()).is_none());
        assert!(ModeConfig::load(dir.path()).unwrap().is_some());
    }

    #[test]
    fn deactivate_removes_flag() {
        let dir = TempDir::new().unwrap();
        ModeConfig::activate(Strictness::Strict, None, None)
            .save(dir.path())
            .unwrap();
        assert!(ModeConfig::deactivate(dir.path()).unwrap());
        assert!(!ModeConfig::deactivate(dir.path()).unwrap());
        assert!(ModeConfig::load_active(dir.path()).is_none());
    }
}
