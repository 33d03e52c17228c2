use crate::config::RunConfig;
use crate::error::TrainingResult;
use crate::export::{ArtifactExporter, ExportReport};
use crate::job::{RunMode, RunPlan};
use crate::layout::WorkspaceLayout;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::rules::apply_rules;
use crate::trainer::{Trainer, TrainerSession};
use std::sync::Arc;

#[derive(Debug)]
pub enum RunOutcome {
    /// Test pass (and mesh extraction when requested) finished.
    Tested,
    /// The interactive viewer was closed.
    Interactive,
    /// Training, evaluation and mesh extraction finished.
    Trained { export: Option<ExportReport> },
}

/// Drives one run from a resolved configuration to exported artifacts.
pub struct Orchestrator {
    trainer: Arc<dyn Trainer>,
    exporter: Option<ArtifactExporter>,
    progress: Arc<dyn ProgressSink>,
    argv: String,
}

impl Orchestrator {
    pub fn new(trainer: Arc<dyn Trainer>, progress: Arc<dyn ProgressSink>) -> Self {
        Self { trainer, exporter: None, progress, argv: String::new() }
    }

    /// Export artifacts after training runs.
    #[must_use]
    pub fn with_exporter(mut self, exporter: ArtifactExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Command line recorded in every trainer session.
    #[must_use]
    pub fn with_argv(mut self, argv: impl Into<String>) -> Self {
        self.argv = argv.into();
        self
    }

    /// Apply derived rules, build the plan and run it.
    pub async fn run(&self, config: &RunConfig) -> TrainingResult<RunOutcome> {
        let derived = apply_rules(config)?;
        let plan = RunPlan::new(derived.config)?;
        tracing::info!(
            trainer = self.trainer.id(),
            backbone = ?plan.backbone,
            guidance = plan.guidance.as_ref().map(|g| g.name()),
            mode = ?plan.mode,
            rules = ?derived.applied,
            "run plan ready"
        );
        self.execute(&plan).await
    }

    pub async fn execute(&self, plan: &RunPlan) -> TrainingResult<RunOutcome> {
        let workspace = plan.workspace().to_string();
        let progress = self.progress.as_ref();
        progress.on_event(ProgressEvent::Started { workspace: workspace.clone() });

        let outcome = match plan.mode {
            RunMode::Test => self.run_test(plan, progress).await?,
            RunMode::Train => self.run_train(plan, progress).await?,
        };

        progress.on_event(ProgressEvent::Finished { workspace });
        Ok(outcome)
    }

    async fn run_test(&self, plan: &RunPlan, progress: &dyn ProgressSink) -> TrainingResult<RunOutcome> {
        let session = TrainerSession::for_evaluation(plan, &self.argv);

        if plan.config.gui {
            self.trainer.gui(&session, progress).await?;
            return Ok(RunOutcome::Interactive);
        }

        self.trainer.test(&session, progress).await?;
        if plan.config.save_mesh {
            self.trainer.save_mesh(&session, progress).await?;
        }
        Ok(RunOutcome::Tested)
    }

    async fn run_train(&self, plan: &RunPlan, progress: &dyn ProgressSink) -> TrainingResult<RunOutcome> {
        let session = TrainerSession::for_training(plan, &self.argv);

        if plan.config.gui {
            self.trainer.gui(&session, progress).await?;
            return Ok(RunOutcome::Interactive);
        }

        self.trainer.train(&session, progress).await?;

        // Evaluate the final checkpoint with a fresh trainer that has no guidance loaded.
        let evaluation = TrainerSession::for_evaluation(plan, &self.argv);
        self.trainer.test(&evaluation, progress).await?;
        self.trainer.save_mesh(&evaluation, progress).await?;

        let export = match &self.exporter {
            Some(exporter) => {
                let layout = WorkspaceLayout::new(evaluation.workspace.clone());
                Some(exporter.export(&layout, plan.config.albedo, progress).await?)
            }
            None => None,
        };
        Ok(RunOutcome::Trained { export })
    }
}
