//! Host hook adapters.
//!
//! Each subcommand reads one event as JSON on stdin and answers on stdout.
//! Exit code 2 with a reason on stderr refuses a write; every other path
//! exits 0. Unparseable input is logged and allowed.

use crate::output::write_json_line;
use clap::Subcommand;
use redgreen_core::gate::GateDecision;
use redgreen_core::types::{Strictness, ToolKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::path::Path;

/// Exit code the host treats as "deny this tool call".
pub const BLOCK_EXIT_CODE: i32 = 2;

#[derive(Subcommand)]
pub enum HookSubcommand {
    /// Before a file write (PreToolUse)
    PreWrite {
        /// Override the session strictness for this decision
        #[arg(long)]
        strictness: Option<Strictness>,
    },

    /// After a shell command has run (PostToolUse)
    PostCommand,

    /// At the start of a user turn (UserPromptSubmit)
    UserPrompt,
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct HookInput {
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    tool_input: ToolInput,
    #[serde(default)]
    tool_response: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolInput {
    file_path: Option<String>,
    notebook_path: Option<String>,
    command: Option<String>,
}

impl HookInput {
    fn target_path(&self) -> Option<&str> {
        self.tool_input
            .file_path
            .as_deref()
            .or(self.tool_input.notebook_path.as_deref())
            .filter(|p| !p.is_empty())
    }

    fn exit_code(&self) -> Option<i32> {
        let resp = self.tool_response.as_ref()?.as_object()?;
        ["exit_code", "exitCode", "returncode"]
            .iter()
            .find_map(|k| resp.get(*k).and_then(Value::as_i64))
            .and_then(|c| i32::try_from(c).ok())
    }

    /// Everything the command printed, joined.
    fn output(&self) -> Option<String> {
        match self.tool_response.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(resp) => {
                let parts: Vec<&str> = ["stdout", "stderr", "output"]
                    .iter()
                    .filter_map(|k| resp.get(*k).and_then(Value::as_str))
                    .filter(|s| !s.is_empty())
                    .collect();
                (!parts.is_empty()).then(|| parts.join("\n"))
            }
            _ => None,
        }
    }
}

fn read_input() -> Option<HookInput> {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::warn!(error = %e, "failed to read hook input; allowing");
        return None;
    }
    parse_input(&raw)
}

fn parse_input(raw: &str) -> Option<HookInput> {
    if raw.trim().is_empty() {
        return Some(HookInput::default());
    }
    match serde_json::from_str(raw) {
        Ok(input) => Some(input),
        Err(e) => {
            tracing::warn!(error = %e, "malformed hook input; allowing");
            None
        }
    }
}

fn context_output(event: &str, message: &str) -> Value {
    json!({
        "hookSpecificOutput": {
            "hookEventName": event,
            "additionalContext": message,
        }
    })
}

fn deny_output(reason: &str) -> Value {
    json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": "deny",
            "permissionDecisionReason": reason,
        }
    })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Returns the process exit code. Hook adapters never fail: every error is
/// logged and the host sees an allow.
pub fn run(root: &Path, subcmd: HookSubcommand) -> i32 {
    let mut out = std::io::stdout().lock();
    match subcmd {
        HookSubcommand::PreWrite { strictness } => pre_write(root, strictness, &mut out),
        HookSubcommand::PostCommand => post_command(root, &mut out),
        HookSubcommand::UserPrompt => user_prompt(root, &mut out),
    }
}

/// Write a hook response. Write failures are logged, never surfaced.
fn emit<W: Write>(out: &mut W, value: &Value) {
    if let Err(e) = write_json_line(out, value) {
        tracing::warn!(error = %e, "failed to write hook response");
    }
}

/// Report a gate decision to the host and return the exit code.
fn answer_write<W: Write>(decision: GateDecision, out: &mut W) -> i32 {
    match decision {
        GateDecision::Allow { note: None } => 0,
        GateDecision::Allow { note: Some(msg) } | GateDecision::Warn { message: msg } => {
            emit(out, &context_output("PreToolUse", &msg));
            0
        }
        GateDecision::Block { message } => {
            eprintln!("{message}");
            emit(out, &deny_output(&message));
            BLOCK_EXIT_CODE
        }
    }
}

fn pre_write<W: Write>(root: &Path, strictness: Option<Strictness>, out: &mut W) -> i32 {
    let Some(input) = read_input() else {
        return 0;
    };
    let Some(path) = input.target_path() else {
        return 0;
    };
    let tool = ToolKind::parse(&input.tool_name);
    let enforcer = super::load_enforcer(root).with_strictness(strictness);
    answer_write(enforcer.on_before_write(path, &tool), out)
}

fn post_command<W: Write>(root: &Path, out: &mut W) -> i32 {
    let Some(input) = read_input() else {
        return 0;
    };
    let Some(command) = input.tool_input.command.as_deref() else {
        return 0;
    };
    let enforcer = super::load_enforcer(root);
    let output = input.output();
    if let Some(advisory) = enforcer.on_after_command(command, input.exit_code(), output.as_deref())
    {
        emit(out, &context_output("PostToolUse", &advisory));
    }
    0
}

fn user_prompt<W: Write>(root: &Path, out: &mut W) -> i32 {
    let enforcer = super::load_enforcer(root);
    if let Some(status) = enforcer.on_user_turn_start() {
        emit(out, &context_output("UserPromptSubmit", &status));
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_event() {
        let input = parse_input(
            r#"{"tool_name":"Edit","tool_input":{"file_path":"/p/src/a.rs","old_string":"x"}}"#,
        )
        .unwrap();
        assert_eq!(input.tool_name, "Edit");
        assert_eq!(input.target_path(), Some("/p/src/a.rs"));
    }

    #[test]
    fn notebook_path_is_a_target() {
        let input = parse_input(
            r#"{"tool_name":"NotebookEdit","tool_input":{"notebook_path":"nb/analysis.ipynb"}}"#,
        )
        .unwrap();
        assert_eq!(input.target_path(), Some("nb/analysis.ipynb"));
    }

    #[test]
    fn response_exit_code_aliases() {
        for key in ["exit_code", "exitCode", "returncode"] {
            let raw = format!(
                r#"{{"tool_name":"Bash","tool_input":{{"command":"pytest"}},"tool_response":{{"{key}":1}}}}"#
            );
            assert_eq!(parse_input(&raw).unwrap().exit_code(), Some(1), "{key}");
        }
    }

    #[test]
    fn response_output_is_joined() {
        let input = parse_input(
            r#"{"tool_input":{"command":"npx jest"},"tool_response":{"stdout":"PASS a","stderr":"FAIL b"}}"#,
        )
        .unwrap();
        assert_eq!(input.exit_code(), None);
        assert_eq!(input.output().as_deref(), Some("PASS a\nFAIL b"));

        let plain = parse_input(r#"{"tool_input":{"command":"pytest"},"tool_response":"1 failed"}"#)
            .unwrap();
        assert_eq!(plain.output().as_deref(), Some("1 failed"));
    }

    #[test]
    fn malformed_input_is_rejected_quietly() {
        assert!(parse_input("{not json").is_none());
        assert!(parse_input("").unwrap().target_path().is_none());
    }

    #[test]
    fn deny_output_shape() {
        let v = deny_output("nope");
        assert_eq!(v["hookSpecificOutput"]["permissionDecision"], "deny");
        assert_eq!(v["hookSpecificOutput"]["permissionDecisionReason"], "nope");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn write_failures_do_not_change_exit_code() {
        let warn = GateDecision::Warn {
            message: "careful".to_string(),
        };
        assert_eq!(answer_write(warn, &mut ClosedPipe), 0);
        let note = GateDecision::Allow {
            note: Some("tip".to_string()),
        };
        assert_eq!(answer_write(note, &mut ClosedPipe), 0);
        let block = GateDecision::Block {
            message: "no".to_string(),
        };
        assert_eq!(answer_write(block, &mut ClosedPipe), BLOCK_EXIT_CODE);
    }

    #[test]
    fn answer_write_emits_one_json_line() {
        let mut buf = Vec::new();
        let code = answer_write(
            GateDecision::Warn {
                message: "careful".to_string(),
            },
            &mut buf,
        );
        assert_eq!(code, 0);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        let v: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(v["hookSpecificOutput"]["additionalContext"], "careful");

        let mut silent = Vec::new();
        assert_eq!(answer_write(GateDecision::allow(), &mut silent), 0);
        assert!(silent.is_empty());
    }
}
