//! Path-based file classification.
//!
//! Precedence is fixed: a test-pattern match wins over the non-source
//! allowlist, which wins over the default `Source` class.

use crate::error::{RedgreenError, Result};
use crate::paths;
use crate::settings::Settings;
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

pub const DEFAULT_TEST_PATTERNS: &[&str] = &[
    "**/*.test.*",
    "**/*.spec.*",
    "**/*_test.*",
    "**/test_*.py",
    "**/*Test.java",
    "**/*Test.kt",
    "**/*Tests.swift",
    "**/*Tests.cs",
    "**/*_spec.rb",
    "**/__tests__/**",
    "**/tests/**",
    "**/test/**",
    "**/spec/**",
];

const NON_SOURCE_EXTENSIONS: &[&str] = &[
    "json", "md", "yml", "yaml", "toml", "txt", "csv", "xml", "lock",
];

const NON_SOURCE_FILENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "composer.lock",
    "go.sum",
    ".gitignore",
];

const TOOL_DIRS: &[&str] = &[paths::REDGREEN_DIR, paths::CLAUDE_DIR];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

// ---------------------------------------------------------------------------
// FileClass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    TestFile,
    NonSource,
    Source,
}

impl FileClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FileClass::TestFile => "test_file",
            FileClass::NonSource => "non_source",
            FileClass::Source => "source",
        }
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Glob
// ---------------------------------------------------------------------------

/// A compiled glob. Patterns without a `/` match the file name only, so
/// `*.test.ts` behaves like `**/*.test.ts`.
#[derive(Debug, Clone)]
struct Glob {
    pattern: Pattern,
    name_only: bool,
}

impl Glob {
    fn compile(raw: &str) -> Result<Self> {
        let pattern = Pattern::new(raw).map_err(|e| RedgreenError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self {
            pattern,
            name_only: !raw.contains('/'),
        })
    }

    fn matches(&self, path: &str) -> bool {
        let subject = if self.name_only {
            file_name(path)
        } else {
            path
        };
        self.pattern.matches_with(subject, MATCH_OPTIONS)
    }
}

fn compile_all(raw: &[String]) -> Result<Vec<Glob>> {
    raw.iter().map(|p| Glob::compile(p)).collect()
}

fn compile_lenient(raw: &[String]) -> Vec<Glob> {
    raw.iter()
        .filter_map(|p| match Glob::compile(p) {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid glob");
                None
            }
        })
        .collect()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// FileClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileClassifier {
    test: Vec<Glob>,
    source: Vec<Glob>,
}

impl FileClassifier {
    /// Build a classifier, skipping (and logging) invalid patterns.
    pub fn new(source_patterns: &[String], test_patterns: &[String]) -> Self {
        Self {
            test: compile_lenient(test_patterns),
            source: compile_lenient(source_patterns),
        }
    }

    /// Build a classifier, failing on the first invalid pattern.
    pub fn try_new(source_patterns: &[String], test_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            test: compile_all(test_patterns)?,
            source: compile_all(source_patterns)?,
        })
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.source_patterns, &settings.test_patterns)
    }

    /// Classify a normalised, project-relative path.
    pub fn classify(&self, path: &str) -> FileClass {
        if self.test.iter().any(|g| g.matches(path)) {
            return FileClass::TestFile;
        }
        if is_allowlisted(path) {
            return FileClass::NonSource;
        }
        if !self.source.is_empty() && !self.source.iter().any(|g| g.matches(path)) {
            return FileClass::NonSource;
        }
        FileClass::Source
    }
}

/// One-shot classification with lenient pattern compilation.
pub fn classify(path: &str, source_patterns: &[String], test_patterns: &[String]) -> FileClass {
    FileClassifier::new(source_patterns, test_patterns).classify(path)
}

fn is_allowlisted(path: &str) -> bool {
    let name = file_name(path);

    if TOOL_DIRS
        .iter()
        .any(|dir| path.split('/').any(|segment| segment == *dir))
    {
        return true;
    }
    if NON_SOURCE_FILENAMES.contains(&name) || name.starts_with('.') {
        return true;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => NON_SOURCE_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
