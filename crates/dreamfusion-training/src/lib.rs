//! Dreamfusion Training
//!
//! Driver-side primitives for text-to-3D training runs:
//! - Resolving run configuration from flags and parameter documents (`RunConfig`)
//! - Selecting backbone, guidance and optimisation (`RunPlan`)
//! - Handing stages to an external trainer (`Trainer`)
//! - Exporting finished workspaces to object storage (`ArtifactExporter`)

pub mod config;
pub mod error;
pub mod export;
pub mod job;
pub mod layout;
pub mod metadata;
pub mod orchestrator;
pub mod params;
pub mod process_trainer;
pub mod progress;
pub mod resolver;
pub mod rules;
pub mod schedule;
pub mod settings;
pub mod storage;
pub mod trainer;

pub use config::{MergedConfig, RunConfig};
pub use error::{TrainingError, TrainingResult};
pub use export::{ArtifactExporter, Destinations, ExportReport, FailedUpload, RenderKind};
pub use job::{Backbone, Guidance, RayMarcher, RunMode, RunPlan};
pub use layout::WorkspaceLayout;
pub use metadata::RunMetadata;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use params::{hyperparameters_path, load_params, parse_nested_json};
pub use process_trainer::ProcessTrainer;
pub use progress::{NullProgressSink, ProgressEvent, ProgressSink, StdoutProgressSink};
pub use resolver::{resolve_local, resolve_remote, resolve_with};
pub use rules::{apply_rules, DerivedConfig, DerivedRule};
pub use schedule::{LrSchedule, OptimizerSpec};
pub use settings::{DriverSettings, StoreKind};
pub use storage::{build_store, AwsCliStore, InMemoryStore, LocalStore, ObjectStore, ObjectUri};
pub use trainer::{Trainer, TrainerSession, TrainerStage};
