use crate::config::RunConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::schedule::{LrSchedule, OptimizerSpec};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Poses the training loader yields per epoch.
pub const TRAIN_POSES_PER_EPOCH: u64 = 100;
/// Views rendered by the validation loader.
pub const VALID_VIEWS: u32 = 5;
/// Views rendered by the test loader.
pub const TEST_VIEWS: u32 = 100;

/// Network representation of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backbone {
    Vanilla,
    Grid,
    GridTaichi,
}

impl FromStr for Backbone {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vanilla" => Ok(Self::Vanilla),
            "grid" => Ok(Self::Grid),
            "grid_taichi" => Ok(Self::GridTaichi),
            other => Err(TrainingError::NotImplemented { option: "backbone", value: other.to_string() }),
        }
    }
}

/// Model supplying the training signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Guidance {
    StableDiffusion { sd_version: String, hf_key: Option<String> },
    Clip,
}

impl Guidance {
    pub fn from_config(config: &RunConfig) -> TrainingResult<Self> {
        match config.guidance.as_str() {
            "stable-diffusion" => Ok(Self::StableDiffusion {
                sd_version: config.sd_version.clone(),
                hf_key: config.hf_key.clone(),
            }),
            "clip" => Ok(Self::Clip),
            other => Err(TrainingError::NotImplemented { option: "guidance", value: other.to_string() }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StableDiffusion { .. } => "stable-diffusion",
            Self::Clip => "clip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Train,
    Test,
}

/// Ray-marching implementation the trainer should use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RayMarcher {
    Pytorch,
    Cuda,
    Taichi { arch: String, device_memory_gb: f64, half2_vectorization: bool },
}

impl RayMarcher {
    pub fn from_config(config: &RunConfig) -> Self {
        if config.taichi_ray {
            Self::Taichi { arch: "cuda".to_string(), device_memory_gb: 4.0, half2_vectorization: true }
        } else if config.cuda_ray {
            Self::Cuda
        } else {
            Self::Pytorch
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSpec {
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Optimisation settings, only present for training runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPlan {
    pub optimizer: OptimizerSpec,
    pub schedule: LrSchedule,
    pub max_epoch: u64,
    pub train_loader: LoaderSpec,
    pub valid_loader: LoaderSpec,
}

/// Everything resolved from a configuration before a trainer is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub config: RunConfig,
    pub mode: RunMode,
    pub backbone: Backbone,
    pub ray_marcher: RayMarcher,
    pub guidance: Option<Guidance>,
    pub optimization: Option<OptimizationPlan>,
    pub test_loader: LoaderSpec,
}

impl RunPlan {
    /// Select backbone and, for training runs, guidance and optimisation.
    ///
    /// Expects a configuration that already went through
    /// [`crate::rules::apply_rules`].
    pub fn new(config: RunConfig) -> TrainingResult<Self> {
        let backbone: Backbone = config.backbone.parse()?;
        let mode = if config.test { RunMode::Test } else { RunMode::Train };
        let test_loader =
            LoaderSpec { width: config.gui_width, height: config.gui_height, size: u64::from(TEST_VIEWS) };

        let (guidance, optimization) = match mode {
            RunMode::Test => (None, None),
            RunMode::Train => {
                let optimization = OptimizationPlan {
                    optimizer: OptimizerSpec::from_config(&config)?,
                    schedule: LrSchedule::for_backbone(backbone, &config),
                    max_epoch: max_epoch(config.iters),
                    train_loader: LoaderSpec {
                        width: config.train_width,
                        height: config.train_height,
                        size: TRAIN_POSES_PER_EPOCH,
                    },
                    valid_loader: LoaderSpec {
                        width: config.gui_width,
                        height: config.gui_height,
                        size: u64::from(VALID_VIEWS),
                    },
                };
                (Some(Guidance::from_config(&config)?), Some(optimization))
            }
        };

        Ok(Self {
            ray_marcher: RayMarcher::from_config(&config),
            config,
            mode,
            backbone,
            guidance,
            optimization,
            test_loader,
        })
    }

    pub fn workspace(&self) -> &str {
        &self.config.workspace
    }
}

/// Epochs needed to cover `iters` steps.
pub fn max_epoch(iters: u64) -> u64 {
    iters.div_ceil(TRAIN_POSES_PER_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backbone_is_fatal() {
        let config = RunConfig { backbone: "mlp".to_string(), ..RunConfig::default() };
        let err = RunPlan::new(config).unwrap_err();
        assert_eq!(err.to_string(), "--backbone mlp is not implemented");
    }

    #[test]
    fn test_unknown_guidance_is_fatal_when_training() {
        let config = RunConfig { guidance: "dalle".to_string(), ..RunConfig::default() };
        assert!(matches!(
            RunPlan::new(config),
            Err(TrainingError::NotImplemented { option: "guidance", .. })
        ));
    }

    #[test]
    fn test_test_mode_skips_guidance() {
        let config = RunConfig { test: true, guidance: "dalle".to_string(), ..RunConfig::default() };
        let plan = RunPlan::new(config).unwrap();
        assert_eq!(plan.mode, RunMode::Test);
        assert!(plan.guidance.is_none());
        assert!(plan.optimization.is_none());
    }

    #[test]
    fn test_train_plan_epochs_and_loaders() {
        let config = RunConfig { iters: 10_050, ..RunConfig::default() };
        let plan = RunPlan::new(config).unwrap();
        let optimization = plan.optimization.unwrap();
        assert_eq!(optimization.max_epoch, 101);
        assert_eq!(optimization.train_loader, LoaderSpec { width: 128, height: 128, size: 100 });
        assert_eq!(optimization.valid_loader.size, 5);
        assert_eq!(plan.test_loader.size, 100);
        assert_eq!(plan.guidance.map(|g| g.name()), Some("stable-diffusion"));
    }

    #[test]
    fn test_ray_marcher_selection() {
        let taichi = RunConfig { taichi_ray: true, cuda_ray: true, ..RunConfig::default() };
        assert!(matches!(RayMarcher::from_config(&taichi), RayMarcher::Taichi { .. }));
        let cuda = RunConfig { cuda_ray: true, ..RunConfig::default() };
        assert_eq!(RayMarcher::from_config(&cuda), RayMarcher::Cuda);
        assert_eq!(RayMarcher::from_config(&RunConfig::default()), RayMarcher::Pytorch);
    }
}
