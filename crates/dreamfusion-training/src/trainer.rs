use crate::error::TrainingResult;
use crate::job::{Guidance, RunPlan};
use crate::progress::ProgressSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Trainer name; it also prefixes the log (`log_df.txt`) and checkpoints.
pub const TRAINER_NAME: &str = "df";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerStage {
    Train,
    Test,
    Mesh,
    Gui,
}

impl TrainerStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
            Self::Mesh => "mesh",
            Self::Gui => "gui",
        }
    }
}

impl fmt::Display for TrainerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a trainer instance is built from.
///
/// A session owns its guidance model: evaluation after training uses a fresh
/// session without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSession {
    pub name: String,
    /// Command line that launched the run.
    pub argv: String,
    pub workspace: PathBuf,
    pub plan: RunPlan,
    pub guidance: Option<Guidance>,
    pub fp16: bool,
    /// Checkpoint to resume from (`latest`, `scratch`, or a path).
    pub use_checkpoint: String,
    pub eval_interval: Option<u32>,
}

impl TrainerSession {
    /// Session for the training loop, with the plan's guidance attached.
    pub fn for_training(plan: &RunPlan, argv: &str) -> Self {
        Self {
            guidance: plan.guidance.clone(),
            eval_interval: Some(plan.config.eval_interval),
            ..Self::for_evaluation(plan, argv)
        }
    }

    /// Session for testing and mesh extraction; never loads guidance.
    pub fn for_evaluation(plan: &RunPlan, argv: &str) -> Self {
        Self {
            name: TRAINER_NAME.to_string(),
            argv: argv.to_string(),
            workspace: PathBuf::from(&plan.config.workspace),
            plan: plan.clone(),
            guidance: None,
            fp16: plan.config.fp16,
            use_checkpoint: plan.config.ckpt.clone(),
            eval_interval: None,
        }
    }
}

/// The component that owns the network, the renderer and the loss.
#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    /// Run the optimisation loop for the plan's `max_epoch` epochs.
    async fn train(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()>;

    /// Render the test views into `<workspace>/results`.
    async fn test(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()>;

    /// Extract a textured mesh into `<workspace>/mesh`.
    async fn save_mesh(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()>;

    /// Hand control to the interactive viewer until it is closed.
    async fn gui(&self, session: &TrainerSession, progress: &dyn ProgressSink) -> TrainingResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;

    #[test]
    fn test_evaluation_session_drops_guidance() {
        let plan = RunPlan::new(RunConfig::default()).unwrap();
        assert!(plan.guidance.is_some());

        let train = TrainerSession::for_training(&plan, "dreamfusion run");
        let eval = TrainerSession::for_evaluation(&plan, "dreamfusion run");
        assert_eq!(train.guidance, plan.guidance);
        assert_eq!(train.eval_interval, Some(1));
        assert!(eval.guidance.is_none());
        assert_eq!(eval.name, "df");
        assert_eq!(eval.use_checkpoint, "latest");
    }
}
