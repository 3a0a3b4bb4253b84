use crate::output::print_json;
use redgreen_core::lifecycle::StatusReport;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let enforcer = super::load_enforcer(root);
    let report = StatusReport::build(enforcer.mode(), &enforcer.snapshot());

    if json {
        return print_json(&report);
    }

    println!("{}", report.summary());
    if let Some(cycle) = &report.cycle {
        for file in &cycle.test_files_written {
            println!("  test: {file}");
        }
        if cycle.failed_runs_in_green > 0 {
            println!("  failing runs in GREEN: {}", cycle.failed_runs_in_green);
        }
    }
    Ok(())
}
