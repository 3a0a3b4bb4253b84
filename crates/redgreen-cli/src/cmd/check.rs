use crate::output::print_json;
use clap::Subcommand;
use redgreen_core::gate;
use redgreen_core::outcome::CommandOutcome;
use redgreen_core::types::ToolKind;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum CheckSubcommand {
    /// Classify a path and show the write-gate decision
    File {
        path: String,

        /// Host tool name used for the write
        #[arg(long, default_value = "Write")]
        tool: String,
    },

    /// Classify a command and show the transition it would cause
    Command {
        /// The full command line
        cmd: String,

        /// Exit code of the run
        #[arg(long, allow_negative_numbers = true)]
        exit_code: Option<i32>,

        /// Captured output, used when no exit code is given
        #[arg(long)]
        output: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: CheckSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CheckSubcommand::File { path, tool } => file(root, &path, &tool, json),
        CheckSubcommand::Command {
            cmd,
            exit_code,
            output,
        } => command(root, &cmd, exit_code, output.as_deref(), json),
    }
}

fn file(root: &Path, raw: &str, tool: &str, json: bool) -> anyhow::Result<()> {
    let enforcer = super::load_enforcer(root);
    let tool = ToolKind::parse(tool);
    let (path, class) = enforcer.classify_path(raw);
    let snapshot = enforcer.snapshot();
    let decision = if tool.is_write() {
        gate::decide(&path, &tool, enforcer.mode(), &snapshot, class)
    } else {
        gate::GateDecision::allow()
    };

    if json {
        return print_json(&serde_json::json!({
            "path": path,
            "class": class,
            "active": enforcer.is_active(),
            "phase": snapshot.phase(),
            "decision": decision,
        }));
    }

    println!("{path}: {class}");
    if !enforcer.is_active() {
        println!("TDD mode is off; every write is allowed.");
    }
    match decision.message() {
        Some(msg) => println!("{}: {msg}", decision.label()),
        None => println!("{}", decision.label()),
    }
    Ok(())
}

fn command(
    root: &Path,
    cmd: &str,
    exit_code: Option<i32>,
    output: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let enforcer = super::load_enforcer(root);
    let preview = enforcer.preview_command(cmd, exit_code, output);

    if json {
        return print_json(&preview);
    }

    match &preview.outcome {
        CommandOutcome::NotATest => println!("not a test command"),
        CommandOutcome::TestRun(run) => {
            println!("test run: {} ({}, by {:?})", run.runner, run.outcome, run.signal)
        }
    }
    if let Some(t) = &preview.transition {
        println!("{} -> {}: {}", t.from.label(), t.to.label(), t.message);
    }
    Ok(())
}
