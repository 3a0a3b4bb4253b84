//! Layered settings resolution.
//!
//! Settings documents are Markdown files whose YAML frontmatter carries the
//! keys. Layers apply in order: built-in defaults, the global document, the
//! project document, then per-invocation overrides. Each layer only sets the
//! keys it names.

use crate::classifier::DEFAULT_TEST_PATTERNS;
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::policy::{AmbiguousOutcome, FailPolicy};
use crate::types::Strictness;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

// ---------------------------------------------------------------------------
// SettingsLayer
// ---------------------------------------------------------------------------

/// One partial layer of settings. Absent keys leave the lower layer intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strictness: Option<Strictness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguous_outcome: Option<AmbiguousOutcome>,
}

/// Per-invocation overrides share the layer shape.
pub type SettingsOverrides = SettingsLayer;

impl SettingsLayer {
    pub fn is_empty(&self) -> bool {
        *self == SettingsLayer::default()
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub test_command: Option<String>,
    pub strictness: Strictness,
    pub max_iterations: u32,
    pub source_patterns: Vec<String>,
    pub test_patterns: Vec<String>,
    pub test_command_patterns: Vec<String>,
    pub ambiguous_outcome: AmbiguousOutcome,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            test_command: None,
            strictness: Strictness::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            source_patterns: Vec::new(),
            test_patterns: DEFAULT_TEST_PATTERNS.iter().map(|s| s.to_string()).collect(),
            test_command_patterns: Vec::new(),
            ambiguous_outcome: AmbiguousOutcome::default(),
        }
    }
}

impl Settings {
    pub fn apply(&mut self, layer: &SettingsLayer) {
        if let Some(cmd) = &layer.test_command {
            self.test_command = Some(cmd.clone());
        }
        if let Some(s) = layer.strictness {
            self.strictness = s;
        }
        if let Some(n) = layer.max_iterations {
            self.max_iterations = n;
        }
        if let Some(p) = &layer.source_patterns {
            self.source_patterns = p.clone();
        }
        if let Some(p) = &layer.test_patterns {
            self.test_patterns = p.clone();
        }
        if let Some(p) = &layer.test_command_patterns {
            self.test_command_patterns = p.clone();
        }
        if let Some(a) = layer.ambiguous_outcome {
            self.ambiguous_outcome = a;
        }
    }

    pub fn policy(&self) -> FailPolicy {
        FailPolicy::default().with_ambiguous_output(self.ambiguous_outcome)
    }

    /// Resolve settings for `root` using the global document under `$HOME`.
    pub fn resolve(root: &Path, overrides: &SettingsOverrides) -> ResolvedSettings {
        let global = paths::global_settings_path();
        Self::resolve_from(global.as_deref(), root, overrides)
    }

    /// Resolve settings with an explicit global document location.
    pub fn resolve_from(
        global: Option<&Path>,
        root: &Path,
        overrides: &SettingsOverrides,
    ) -> ResolvedSettings {
        let mut settings = Settings::default();
        let mut layers = Vec::new();

        if let Some(path) = global {
            if let Some(layer) = load_layer(path) {
                settings.apply(&layer);
                layers.push(LoadedLayer {
                    kind: LayerKind::Global,
                    path: Some(path.to_path_buf()),
                });
            }
        }

        let project = paths::project_settings_path(root);
        if let Some(layer) = load_layer(&project) {
            settings.apply(&layer);
            layers.push(LoadedLayer {
                kind: LayerKind::Project,
                path: Some(project),
            });
        }

        if !overrides.is_empty() {
            settings.apply(overrides);
            layers.push(LoadedLayer {
                kind: LayerKind::Overrides,
                path: None,
            });
        }

        ResolvedSettings { settings, layers }
    }
}

// ---------------------------------------------------------------------------
// ResolvedSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Global,
    Project,
    Overrides,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedLayer {
    pub kind: LayerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSettings {
    pub settings: Settings,
    /// Layers that contributed, lowest precedence first.
    pub layers: Vec<LoadedLayer>,
}

// ---------------------------------------------------------------------------
// Frontmatter parsing
// ---------------------------------------------------------------------------

/// Extract the YAML content between the leading `---` line and the next one.
fn extract_frontmatter(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix("---")?;
    let rest = if let Some(r) = rest.strip_prefix('\n') {
        r
    } else if let Some(r) = rest.strip_prefix("\r\n") {
        r
    } else {
        return None;
    };
    if rest.starts_with("---") {
        return Some("");
    }
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// Parse a settings layer from a document's raw content.
///
/// A document without frontmatter yields an empty layer.
pub fn parse_settings_document(content: &str) -> Result<SettingsLayer> {
    match extract_frontmatter(content) {
        Some(fm) if !fm.trim().is_empty() => Ok(serde_yaml::from_str(fm)?),
        _ => Ok(SettingsLayer::default()),
    }
}

/// Load one layer from disk. Missing files are skipped silently; unreadable
/// or malformed ones are skipped with a warning.
fn load_layer(path: &Path) -> Option<SettingsLayer> {
    let content = match io::read_optional(path) {
        Ok(Some(c)) => c,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            return None;
        }
    };
    match parse_settings_document(&content) {
        Ok(layer) => Some(layer),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings frontmatter");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_settings(path: &Path, frontmatter: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("---\n{frontmatter}---\n\n# Notes\n")).unwrap();
    }

    #[test]
    fn defaults_without_any_files() {
        let dir = TempDir::new().unwrap();
        let resolved = Settings::resolve_from(None, dir.path(), &SettingsOverrides::default());
        assert_eq!(resolved.settings, Settings::default());
        assert!(resolved.layers.is_empty());
        assert_eq!(resolved.settings.max_iterations, 5);
        assert_eq!(resolved.settings.strictness, Strictness::Strict);
    }

    #[test]
    fn project_overrides_global() {
        let home = TempDir::new().unwrap();
        let proj = TempDir::new().unwrap();
        let global = home.path().join(".redgreen/settings.md");
        write_settings(&global, "strictness: relaxed\ntestCommand: make test\nmaxIterations: 9\n");
        write_settings(
            &paths::project_settings_path(proj.path()),
            "strictness: standard\n",
        );

        let resolved =
            Settings::resolve_from(Some(&global), proj.path(), &SettingsOverrides::default());
        let s = &resolved.settings;
        assert_eq!(s.strictness, Strictness::Standard);
        assert_eq!(s.test_command.as_deref(), Some("make test"));
        assert_eq!(s.max_iterations, 9);
        let kinds: Vec<LayerKind> = resolved.layers.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![LayerKind::Global, LayerKind::Project]);
    }

    #[test]
    fn overrides_beat_project() {
        let proj = TempDir::new().unwrap();
        write_settings(
            &paths::project_settings_path(proj.path()),
            "strictness: standard\ntestCommand: npm test\n",
        );
        let overrides = SettingsOverrides {
            strictness: Some(Strictness::Relaxed),
            ..Default::default()
        };
        let resolved = Settings::resolve_from(None, proj.path(), &overrides);
        assert_eq!(resolved.settings.strictness, Strictness::Relaxed);
        assert_eq!(resolved.settings.test_command.as_deref(), Some("npm test"));
        assert_eq!(resolved.layers.last().unwrap().kind, LayerKind::Overrides);
    }

    #[test]
    fn pattern_lists_replace_lower_layer() {
        let proj = TempDir::new().unwrap();
        write_settings(
            &paths::project_settings_path(proj.path()),
            "testPatterns:\n  - \"checks/**\"\nsourcePatterns:\n  - \"src/**\"\n",
        );
        let resolved = Settings::resolve_from(None, proj.path(), &SettingsOverrides::default());
        assert_eq!(resolved.settings.test_patterns, vec!["checks/**".to_string()]);
        assert_eq!(resolved.settings.source_patterns, vec!["src/**".to_string()]);
    }

    #[test]
    fn malformed_frontmatter_is_skipped() {
        let proj = TempDir::new().unwrap();
        write_settings(
            &paths::project_settings_path(proj.path()),
            "strictness: [not, a, scalar\n",
        );
        let resolved = Settings::resolve_from(None, proj.path(), &SettingsOverrides::default());
        assert_eq!(resolved.settings, Settings::default());
        assert!(resolved.layers.is_empty());
    }

    #[test]
    fn unknown_strictness_value_skips_layer() {
        let proj = TempDir::new().unwrap();
        write_settings(
            &paths::project_settings_path(proj.path()),
            "strictness: paranoid\n",
        );
        let resolved = Settings::resolve_from(None, proj.path(), &SettingsOverrides::default());
        assert_eq!(resolved.settings.strictness, Strictness::Strict);
    }

    #[test]
    fn document_without_frontmatter_is_empty_layer() {
        let layer = parse_settings_document("# Just notes\n\nstrictness: relaxed\n").unwrap();
        assert!(layer.is_empty());
    }

    #[test]
    fn empty_frontmatter_is_empty_layer() {
        let layer = parse_settings_document("---\n---\nbody").unwrap();
        assert!(layer.is_empty());
    }

    #[test]
    fn ambiguous_outcome_feeds_policy() {
        let layer = parse_settings_document("---\nambiguousOutcome: fail\n---\n").unwrap();
        let mut s = Settings::default();
        s.apply(&layer);
        assert_eq!(s.policy().on_ambiguous_output, AmbiguousOutcome::Fail);
    }
}
