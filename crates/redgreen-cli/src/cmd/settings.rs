use crate::output::{print_json, print_table};
use redgreen_core::settings::{LayerKind, Settings, SettingsOverrides};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let resolved = Settings::resolve(root, &SettingsOverrides::default());

    if json {
        return print_json(&resolved);
    }

    let s = &resolved.settings;
    let list = |v: &[String]| {
        if v.is_empty() {
            "(any)".to_string()
        } else {
            v.join(", ")
        }
    };
    let rows = vec![
        vec![
            "testCommand".to_string(),
            s.test_command.clone().unwrap_or_else(|| "(none)".to_string()),
        ],
        vec!["strictness".to_string(), s.strictness.to_string()],
        vec!["maxIterations".to_string(), s.max_iterations.to_string()],
        vec!["sourcePatterns".to_string(), list(&s.source_patterns)],
        vec!["testPatterns".to_string(), list(&s.test_patterns)],
        vec![
            "testCommandPatterns".to_string(),
            list(&s.test_command_patterns),
        ],
        vec![
            "ambiguousOutcome".to_string(),
            s.ambiguous_outcome.as_str().to_string(),
        ],
    ];
    print_table(&["KEY", "VALUE"], rows);

    println!();
    if resolved.layers.is_empty() {
        println!("Layers: defaults only");
    } else {
        for layer in &resolved.layers {
            let kind = match layer.kind {
                LayerKind::Global => "global",
                LayerKind::Project => "project",
                LayerKind::Overrides => "overrides",
            };
            match &layer.path {
                Some(p) => println!("Layer: {kind} ({})", p.display()),
                None => println!("Layer: {kind}"),
            }
        }
    }
    Ok(())
}
