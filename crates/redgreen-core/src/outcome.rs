//! Test-run detection and outcome classification.
//!
//! Detection is table-driven: a [`CommandClassifier`] maps a shell command to
//! the [`RunnerKind`] that would execute tests, or `None`. The built-in
//! [`RunnerTable`] can be extended from settings without touching the
//! outcome logic.

use crate::error::{RedgreenError, Result};
use crate::policy::FailPolicy;
use crate::settings::Settings;
use crate::types::TestOutcome;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// RunnerKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    PackageScript,
    Jest,
    Vitest,
    Mocha,
    Playwright,
    Pytest,
    Unittest,
    GoTest,
    Cargo,
    Rspec,
    Minitest,
    Maven,
    Gradle,
    Dotnet,
    Phpunit,
    Mix,
    Swift,
    Deno,
    Make,
    /// Matched the configured `testCommand` or a `testCommandPatterns` entry.
    Configured,
}

impl RunnerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerKind::PackageScript => "package_script",
            RunnerKind::Jest => "jest",
            RunnerKind::Vitest => "vitest",
            RunnerKind::Mocha => "mocha",
            RunnerKind::Playwright => "playwright",
            RunnerKind::Pytest => "pytest",
            RunnerKind::Unittest => "unittest",
            RunnerKind::GoTest => "go_test",
            RunnerKind::Cargo => "cargo",
            RunnerKind::Rspec => "rspec",
            RunnerKind::Minitest => "minitest",
            RunnerKind::Maven => "maven",
            RunnerKind::Gradle => "gradle",
            RunnerKind::Dotnet => "dotnet",
            RunnerKind::Phpunit => "phpunit",
            RunnerKind::Mix => "mix",
            RunnerKind::Swift => "swift",
            RunnerKind::Deno => "deno",
            RunnerKind::Make => "make",
            RunnerKind::Configured => "configured",
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Built-in runner signatures
// ---------------------------------------------------------------------------

/// Each regex is matched against one command segment with leading
/// environment assignments removed.
const BUILTIN_RUNNERS: &[(&str, RunnerKind)] = &[
    (
        r"^(?:(?:npm|pnpm|yarn|bun)\s+(?:run(?:-script)?\s+)?test(?::[\w:-]+)?|npm\s+t)(?:\s|$)",
        RunnerKind::PackageScript,
    ),
    (
        r"^(?:(?:npx|pnpx|bunx)\s+|(?:pnpm|yarn)\s+(?:exec\s+)?)?jest(?:\s|$)",
        RunnerKind::Jest,
    ),
    (
        r"^(?:(?:npx|pnpx|bunx)\s+|(?:pnpm|yarn)\s+(?:exec\s+)?)?vitest(?:\s|$)",
        RunnerKind::Vitest,
    ),
    (
        r"^(?:(?:npx|pnpx|bunx)\s+|(?:pnpm|yarn)\s+(?:exec\s+)?)?mocha(?:\s|$)",
        RunnerKind::Mocha,
    ),
    (
        r"^(?:(?:npx|pnpx|bunx)\s+|(?:pnpm|yarn)\s+(?:exec\s+)?)?playwright\s+test(?:\s|$)",
        RunnerKind::Playwright,
    ),
    (
        r"^(?:(?:uv|poetry|pipenv|pdm)\s+run\s+)?(?:python3?\s+-m\s+pytest|py\.test|pytest)(?:\s|$)",
        RunnerKind::Pytest,
    ),
    (
        r"^(?:(?:uv|poetry|pipenv|pdm)\s+run\s+)?python3?\s+(?:-m\s+unittest|manage\.py\s+test)(?:\s|$)",
        RunnerKind::Unittest,
    ),
    (r"^go\s+test(?:\s|$)", RunnerKind::GoTest),
    (
        r"^cargo\s+(?:\+\S+\s+)?(?:test|nextest\s+run)(?:\s|$)",
        RunnerKind::Cargo,
    ),
    (r"^(?:bundle\s+exec\s+)?(?:bin/)?rspec(?:\s|$)", RunnerKind::Rspec),
    (
        r"^(?:bundle\s+exec\s+)?(?:bin/)?(?:rake|rails)\s+test(?:\s|:|$)",
        RunnerKind::Minitest,
    ),
    (r"^(?:\./)?mvnw?\b.*\b(?:test|verify)\b", RunnerKind::Maven),
    (r"^(?:\./)?gradlew?\b.*\b(?:test|check)\b", RunnerKind::Gradle),
    (r"^dotnet\s+test(?:\s|$)", RunnerKind::Dotnet),
    (
        r"^(?:php\s+)?(?:(?:\./)?vendor/bin/)?phpunit(?:\s|$)",
        RunnerKind::Phpunit,
    ),
    (r"^(?:php\s+)?artisan\s+test(?:\s|$)", RunnerKind::Phpunit),
    (r"^mix\s+test(?:\s|$)", RunnerKind::Mix),
    (r"^swift\s+test(?:\s|$)", RunnerKind::Swift),
    (r"^deno\s+test(?:\s|$)", RunnerKind::Deno),
    (r"^make\b.*\b(?:test|check)\b", RunnerKind::Make),
];

static BUILTIN: OnceLock<Vec<RunnerPattern>> = OnceLock::new();

fn builtin_patterns() -> &'static [RunnerPattern] {
    BUILTIN.get_or_init(|| {
        BUILTIN_RUNNERS
            .iter()
            .map(|(re, kind)| RunnerPattern {
                regex: Regex::new(re).expect("built-in runner regex"),
                kind: *kind,
            })
            .collect()
    })
}

static ENV_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn env_prefix_re() -> &'static Regex {
    ENV_PREFIX_RE.get_or_init(|| {
        Regex::new(r#"^(?:(?:[A-Za-z_][A-Za-z0-9_]*=(?:"[^"]*"|'[^']*'|\S*)|env|time|command)\s+)+"#)
            .unwrap()
    })
}

/// Split on `;`, newline, `&&`, `||` and `|` outside quotes. A lone `&`
/// is not a separator, so `2>&1` stays intact.
fn split_unquoted(command: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = command.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' && in_quote != Some('\'') {
            escaped = true;
            continue;
        }
        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            continue;
        }
        let width = match c {
            '"' | '\'' => {
                in_quote = Some(c);
                continue;
            }
            ';' | '\n' | '|' => {
                if c == '|' && chars.peek().is_some_and(|&(_, n)| n == '|') {
                    chars.next();
                    2
                } else {
                    1
                }
            }
            '&' if chars.peek().is_some_and(|&(_, n)| n == '&') => {
                chars.next();
                2
            }
            _ => continue,
        };
        parts.push(&command[start..i]);
        start = i + width;
    }
    parts.push(&command[start..]);
    parts
}

/// Split a shell command into the simple commands it chains, with leading
/// `VAR=value`, `env` and `time` prefixes removed.
pub fn command_segments(command: &str) -> Vec<String> {
    split_unquoted(command)
        .into_iter()
        .map(|seg| {
            let seg = seg
                .trim()
                .trim_start_matches(['(', '{'])
                .trim_end_matches([')', '}'])
                .trim();
            env_prefix_re().replace(seg, "").trim().to_string()
        })
        .filter(|seg| !seg.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// CommandClassifier
// ---------------------------------------------------------------------------

pub trait CommandClassifier {
    /// Return the runner if `command` invokes tests.
    fn detect(&self, command: &str) -> Option<RunnerKind>;
}

#[derive(Debug, Clone)]
pub struct RunnerPattern {
    regex: Regex,
    kind: RunnerKind,
}

/// Declarative table of runner signatures plus configured command prefixes.
#[derive(Debug, Clone)]
pub struct RunnerTable {
    patterns: Vec<RunnerPattern>,
    prefixes: Vec<String>,
}

impl Default for RunnerTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RunnerTable {
    pub fn builtin() -> Self {
        Self {
            patterns: builtin_patterns().to_vec(),
            prefixes: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Add a regex signature. The regex is matched per command segment.
    pub fn with_pattern(mut self, pattern: &str, kind: RunnerKind) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| RedgreenError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.patterns.push(RunnerPattern { regex, kind });
        Ok(self)
    }

    /// Treat any segment starting with `command` as a test run.
    pub fn with_command_prefix(mut self, command: &str) -> Self {
        let command = command.trim();
        if !command.is_empty() {
            self.prefixes.push(command.to_string());
        }
        self
    }

    /// Built-in table extended with the configured test command and
    /// `testCommandPatterns`. Invalid patterns are logged and skipped.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut table = Self::builtin();
        if let Some(cmd) = &settings.test_command {
            table = table.with_command_prefix(cmd);
        }
        for pattern in &settings.test_command_patterns {
            table = match table.clone().with_pattern(pattern, RunnerKind::Configured) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring invalid test command pattern");
                    table
                }
            };
        }
        table
    }

    fn detect_segment(&self, segment: &str) -> Option<RunnerKind> {
        if self.prefixes.iter().any(|p| {
            segment == p
                || segment
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        }) {
            return Some(RunnerKind::Configured);
        }
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(segment))
            .map(|p| p.kind)
    }
}

impl CommandClassifier for RunnerTable {
    fn detect(&self, command: &str) -> Option<RunnerKind> {
        command_segments(command)
            .iter()
            .find_map(|seg| self.detect_segment(seg))
    }
}

// ---------------------------------------------------------------------------
// Output markers
// ---------------------------------------------------------------------------

const FAILURE_MARKERS: &[&str] = &[
    r"\bFAIL\b",
    r"\bFAILED\b",
    r"\bAssertionError\b",
    r"(?i)\bassert(?:ion)?\s+failed\b",
    r"(?i)\b[1-9]\d*\s+(?:failed|failing|failures?|errors?)\b",
    r"(?i)\b(?:failures?|failed|errors?)\s*[:=]\s*[1-9]",
    r"(?m)^\s*(?:Error|error|ERROR)(?:\[\w+\])?:",
    r"(?m)^not ok\b",
];

const PASS_MARKERS: &[&str] = &[
    r"(?i)\ball (?:tests|specs|examples) passed\b",
    r"(?i)\b0\s+(?:failed|failures|failing)\b",
    r"(?i)\b(?:failures?|failed)\s*[:=]\s*0\b",
    r"\btest result: ok\b",
    r"(?m)^(?:ok|PASS|OK)\b",
    r"(?i)\b[1-9]\d*\s+(?:passed|passing)\b",
];

static FAILURE_SET: OnceLock<RegexSet> = OnceLock::new();
static PASS_SET: OnceLock<RegexSet> = OnceLock::new();

fn failure_set() -> &'static RegexSet {
    FAILURE_SET.get_or_init(|| RegexSet::new(FAILURE_MARKERS).expect("failure marker regex"))
}

fn pass_set() -> &'static RegexSet {
    PASS_SET.get_or_init(|| RegexSet::new(PASS_MARKERS).expect("pass marker regex"))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Which evidence decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ExitCode,
    FailureMarker,
    PassMarker,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub runner: RunnerKind,
    pub outcome: TestOutcome,
    pub signal: Signal,
}

impl TestRun {
    pub fn tests_failed(&self) -> bool {
        self.outcome.is_failed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    NotATest,
    TestRun(TestRun),
}

/// Decide pass/fail from captured output alone.
///
/// A failure marker always wins, even if a pass marker is also present.
pub fn outcome_from_output(output: &str, policy: &FailPolicy) -> (TestOutcome, Signal) {
    if failure_set().is_match(output) {
        return (TestOutcome::Failed, Signal::FailureMarker);
    }
    if pass_set().is_match(output) {
        return (TestOutcome::Passed, Signal::PassMarker);
    }
    (policy.on_ambiguous_output.outcome(), Signal::Ambiguous)
}

#[derive(Debug, Clone)]
pub struct OutcomeClassifier<C = RunnerTable> {
    commands: C,
    policy: FailPolicy,
}

impl OutcomeClassifier<RunnerTable> {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(RunnerTable::from_settings(settings), settings.policy())
    }
}

impl<C: CommandClassifier> OutcomeClassifier<C> {
    pub fn new(commands: C, policy: FailPolicy) -> Self {
        Self { commands, policy }
    }

    /// Classify a finished command. Exit code, when known, is authoritative;
    /// otherwise the output is scanned for markers.
    pub fn classify(
        &self,
        command: &str,
        exit_code: Option<i32>,
        output: Option<&str>,
    ) -> CommandOutcome {
        let Some(runner) = self.commands.detect(command) else {
            return CommandOutcome::NotATest;
        };

        let (outcome, signal) = match exit_code {
            Some(code) => (TestOutcome::from_failed(code != 0), Signal::ExitCode),
            None => outcome_from_output(output.unwrap_or(""), &self.policy),
        };

        tracing::debug!(%runner, %outcome, ?signal, "classified test run");
        CommandOutcome::TestRun(TestRun {
            runner,
            outcome,
            signal,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
