use crate::output::print_json;
use anyhow::Context;
use redgreen_core::lifecycle;
use redgreen_core::mode::TaskInfo;
use redgreen_core::settings::{Settings, SettingsOverrides};
use redgreen_core::state::FileCycleStore;
use redgreen_core::types::{Strictness, TaskKind};
use std::path::Path;

pub fn run(
    root: &Path,
    kind: TaskKind,
    description: &str,
    strictness: Option<Strictness>,
    test_command: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let overrides = SettingsOverrides {
        strictness,
        test_command,
        ..SettingsOverrides::default()
    };
    let resolved = Settings::resolve(root, &overrides);
    let task = TaskInfo {
        kind,
        description: description.trim().to_string(),
    };

    let store = FileCycleStore::new(root);
    let (mode, state) = lifecycle::start_cycle(root, &store, &resolved.settings, Some(task))
        .context("failed to start TDD cycle")?;

    if json {
        print_json(&serde_json::json!({
            "mode": mode,
            "cycle": state,
        }))?;
    } else {
        match mode.task.as_ref() {
            Some(t) if !t.description.is_empty() => {
                println!("TDD mode on ({}): {} {}", mode.strictness, t.kind, t.description)
            }
            _ => println!("TDD mode on ({}): {}", mode.strictness, kind),
        }
        if let Some(cmd) = &mode.test_command {
            println!("Test command: {cmd}");
        }
        println!("Phase: {}. Write a failing test first.", state.phase.label());
    }
    Ok(())
}
