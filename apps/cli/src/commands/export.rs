//! Export command implementation.

use super::run::{exporter_for, print_report};
use super::types::ExportCommand;
use anyhow::bail;
use dreamfusion_training::{DriverSettings, StdoutProgressSink, WorkspaceLayout};

/// Execute the export command on a finished workspace.
pub async fn execute(command: ExportCommand, settings: &DriverSettings) -> anyhow::Result<()> {
    if !command.workspace.is_dir() {
        bail!("Workspace not found: {}", command.workspace.display());
    }

    let mut exporter = exporter_for(settings)?;
    if command.no_mirror {
        exporter = exporter.with_mirror(None);
    }

    let layout = WorkspaceLayout::new(command.workspace);
    let report = exporter.export(&layout, command.albedo, &StdoutProgressSink).await?;
    print_report(&report);

    Ok(())
}
