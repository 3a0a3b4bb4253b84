use crate::output::print_json;
use anyhow::Context;
use redgreen_core::lifecycle;
use redgreen_core::state::FileCycleStore;
use std::path::Path;

pub fn run(root: &Path, skip_refactor: bool, json: bool) -> anyhow::Result<()> {
    let state = lifecycle::next_iteration(&FileCycleStore::new(root), skip_refactor)
        .context("cannot begin next iteration")?;

    if json {
        print_json(&state)?;
    } else {
        println!(
            "Next iteration. Phase: {}. Write the next failing test.",
            state.phase.label()
        );
    }
    Ok(())
}
