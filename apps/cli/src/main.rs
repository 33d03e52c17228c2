//! Dreamfusion CLI - driver for text-to-3D training jobs
//!
//! Resolves run parameters, hands the training stages to the external
//! trainer and publishes the finished workspace.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{export, metadata, params, run};
use commands::types::{ExportCommand, MetadataCommand, ParamsCommand, RunCommand};

/// Dreamfusion - text-to-3D training job driver
#[derive(Parser, Debug)]
#[command(
    name = "dreamfusion",
    author,
    version,
    about = "Dreamfusion - text-to-3D training job driver",
    long_about = "Resolves run parameters from flags and parameter documents, runs training, evaluation and mesh extraction through the trainer, then uploads meshes, videos, logs and validation images to object storage."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Driver settings file (overrides DREAMFUSION_SETTINGS)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train (or test) a model and publish its artifacts
    ///
    /// Merges the parameters document over the flags, applies the derived
    /// option rules, runs the trainer stages and exports the workspace.
    Run(Box<RunCommand>),

    /// Print the resolved configuration without training
    Params(Box<ParamsCommand>),

    /// Scrape run metadata from a trainer log
    Metadata(MetadataCommand),

    /// Publish the artifacts of a finished workspace
    Export(ExportCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = config::load_settings(args.settings.as_deref())?;

    match args.command {
        Command::Run(command) => run::execute(*command, &settings).await,
        Command::Params(command) => params::execute(*command, &settings).await,
        Command::Metadata(command) => metadata::execute(&command),
        Command::Export(command) => export::execute(command, &settings).await,
    }
}
