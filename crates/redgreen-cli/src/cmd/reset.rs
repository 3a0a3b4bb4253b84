use crate::output::print_json;
use anyhow::Context;
use redgreen_core::lifecycle;
use redgreen_core::state::FileCycleStore;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let state = lifecycle::reset_cycle(&FileCycleStore::new(root))
        .context("failed to reset cycle")?;

    if json {
        print_json(&state)?;
    } else {
        println!("Cycle reset. Phase: {}.", state.phase.label());
    }
    Ok(())
}
