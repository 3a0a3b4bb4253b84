use crate::output::print_json;
use anyhow::Context;
use redgreen_core::lifecycle;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let was_active = lifecycle::stop_cycle(root).context("failed to stop TDD mode")?;

    if json {
        print_json(&serde_json::json!({ "stopped": was_active }))?;
    } else if was_active {
        println!("TDD mode off.");
    } else {
        println!("TDD mode was not active.");
    }
    Ok(())
}
