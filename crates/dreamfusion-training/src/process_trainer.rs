use crate::error::{TrainingError, TrainingResult};
use crate::layout::WorkspaceLayout;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::trainer::{Trainer, TrainerSession, TrainerStage};
use async_trait::async_trait;
use tokio::process::Command;

/// Trainer that runs each stage as an external program.
///
/// The session is written to `<workspace>/trainer_session.json` and the
/// program is invoked as `<program> <args..> --session <path> --stage <stage>`.
/// Output is inherited so the trainer's own log stays visible.
#[derive(Debug, Clone)]
pub struct ProcessTrainer {
    program: String,
    args: Vec<String>,
}

impl ProcessTrainer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    async fn invoke(
        &self,
        stage: TrainerStage,
        session: &TrainerSession,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<()> {
        let layout = WorkspaceLayout::new(session.workspace.clone());
        layout.ensure_root()?;
        let session_path = layout.session_path();
        tokio::fs::write(&session_path, serde_json::to_vec_pretty(session)?).await?;

        progress.on_event(ProgressEvent::Stage { workspace: layout.name(), stage });
        tracing::info!(program = %self.program, %stage, "launching trainer");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg("--session")
            .arg(&session_path)
            .arg("--stage")
            .arg(stage.as_str())
            .status()
            .await
            .map_err(|e| TrainingError::Trainer(format!("failed to launch {}: {e}", self.program)))?;

        if !status.success() {
            return Err(TrainingError::Trainer(format!("{stage} stage exited with {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Trainer for ProcessTrainer {
    fn id(&self) -> &'static str {
        "process"
    }

    async fn train(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()> {
        self.invoke(TrainerStage::Train, session, progress).await
    }

    async fn test(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()> {
        self.invoke(TrainerStage::Test, session, progress).await
    }

    async fn save_mesh(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()> {
        self.invoke(TrainerStage::Mesh, session, progress).await
    }

    async fn gui(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()> {
        self.invoke(TrainerStage::Gui, session, progress).await
    }
}
