//! Driver settings loading.

use anyhow::Context;
use dreamfusion_training::DriverSettings;
use std::path::Path;

/// Load driver settings.
///
/// Precedence:
/// 1. `--settings <path>`
/// 2. `DREAMFUSION_SETTINGS`
/// 3. `/opt/program/$CONFIG_PATH`
/// 4. Defaults
///
/// `DREAMFUSION_*` variables are applied on top of whichever file was read.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<DriverSettings> {
    DriverSettings::discover(explicit).context("Failed to load driver settings")
}
