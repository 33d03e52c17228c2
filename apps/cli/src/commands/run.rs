//! Run command implementation.

use super::params::resolve_config;
use super::types::RunCommand;
use colored::Colorize;
use dreamfusion_training::{
    build_store, ArtifactExporter, Destinations, DriverSettings, ExportReport, Orchestrator, ProcessTrainer,
    RunOutcome, StdoutProgressSink,
};
use std::sync::Arc;

/// Execute the run command.
///
/// Resolves the configuration, runs every trainer stage the mode calls for
/// and, after training, publishes the workspace.
pub async fn execute(command: RunCommand, settings: &DriverSettings) -> anyhow::Result<()> {
    let config = resolve_config(command.flags.into(), command.params_source, settings).await?;

    let trainer = Arc::new(ProcessTrainer::new(settings.trainer_program.clone(), settings.trainer_args.clone()));
    let argv = std::env::args().collect::<Vec<_>>().join(" ");
    let mut orchestrator = Orchestrator::new(trainer, Arc::new(StdoutProgressSink)).with_argv(argv);

    if !command.skip_export {
        orchestrator = orchestrator.with_exporter(exporter_for(settings)?);
    }

    match orchestrator.run(&config).await? {
        RunOutcome::Tested => println!("{}", "Test run finished".green()),
        RunOutcome::Interactive => println!("{}", "Viewer closed".green()),
        RunOutcome::Trained { export: Some(report) } => print_report(&report),
        RunOutcome::Trained { export: None } => {
            println!("{} {}", "Training finished".green(), "(export skipped)".dimmed());
        }
    }

    Ok(())
}

/// Exporter configured from the driver settings.
pub fn exporter_for(settings: &DriverSettings) -> anyhow::Result<ArtifactExporter> {
    let store = build_store(settings)?;
    Ok(ArtifactExporter::new(store, Destinations::new(settings.bucket.clone(), settings.key_prefix.clone()))
        .with_mirror(settings.mirror_dir().map(Into::into)))
}

pub fn print_report(report: &ExportReport) {
    println!();
    println!("{}", "Export Summary".bold().cyan());
    println!("  Workspace: {}", report.metadata.workspace.green());
    println!("  Checkpoint: {}", report.metadata.checkpoint);
    println!("  Mirrored files: {}", report.mirrored_files);
    println!("  Uploaded: {}", report.uploaded.len().to_string().green());
    if report.failed.is_empty() {
        println!("  Failed: {}", "0".dimmed());
    } else {
        println!("  Failed: {}", report.failed.len().to_string().red());
        for failure in &report.failed {
            println!("    {} {}", failure.local.display().to_string().red(), failure.error.dimmed());
        }
    }
}
