pub mod check;
pub mod hook;
pub mod next;
pub mod reset;
pub mod settings;
pub mod start;
pub mod status;
pub mod stop;

use redgreen_core::hooks::Enforcer;
use redgreen_core::mode::ModeConfig;
use redgreen_core::settings::{Settings, SettingsOverrides};
use redgreen_core::state::FileCycleStore;
use std::path::Path;

/// Build the enforcer for `root` from the on-disk mode flag and settings.
pub fn load_enforcer(root: &Path) -> Enforcer<FileCycleStore> {
    let settings = Settings::resolve(root, &SettingsOverrides::default()).settings;
    let mode = ModeConfig::load_with_policy(root, &settings.policy());
    Enforcer::new(root, FileCycleStore::new(root), mode, settings)
}
