use crate::config::RunConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::job::Backbone;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Optimizer the trainer should build over the network parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adan { lr: f64, eps: f64, weight_decay: f64, max_grad_norm: f64 },
    Adam { lr: f64, betas: (f64, f64), eps: f64 },
}

impl OptimizerSpec {
    pub fn from_config(config: &RunConfig) -> TrainingResult<Self> {
        match config.optim.as_str() {
            // Adan wants a larger step than Adam.
            "adan" => Ok(Self::Adan {
                lr: 10.0 * config.lr,
                eps: 1e-8,
                weight_decay: 0.02,
                max_grad_norm: 5.0,
            }),
            "adam" => Ok(Self::Adam { lr: config.lr, betas: (0.9, 0.99), eps: 1e-15 }),
            other => Err(TrainingError::NotImplemented { option: "optim", value: other.to_string() }),
        }
    }

    pub fn lr(&self) -> f64 {
        match self {
            Self::Adan { lr, .. } | Self::Adam { lr, .. } => *lr,
        }
    }
}

/// Learning-rate multiplier as a function of the global step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LrSchedule {
    /// Linear warm-up, then cosine decay floored at `floor`.
    WarmupCosine { warm_iters: u64, total_iters: u64, floor: f64 },
    /// `0.1^min(step / total_iters, 1)`.
    ExponentialDecay { total_iters: u64 },
}

impl LrSchedule {
    pub fn for_backbone(backbone: Backbone, config: &RunConfig) -> Self {
        match backbone {
            Backbone::Vanilla => Self::WarmupCosine {
                warm_iters: config.warm_iters,
                total_iters: config.iters,
                floor: config.min_lr / config.lr,
            },
            Backbone::Grid | Backbone::GridTaichi => Self::ExponentialDecay { total_iters: config.iters },
        }
    }

    pub fn factor(&self, step: u64) -> f64 {
        match *self {
            Self::WarmupCosine { warm_iters, total_iters, floor } => {
                if warm_iters > 0 && step <= warm_iters {
                    return step as f64 / warm_iters as f64;
                }
                let span = total_iters.saturating_sub(warm_iters);
                let progress = if span == 0 {
                    1.0
                } else {
                    (step.saturating_sub(warm_iters) as f64 / span as f64).min(1.0)
                };
                (0.5 * ((progress * PI).cos() + 1.0)).max(floor)
            }
            Self::ExponentialDecay { total_iters } => {
                let progress =
                    if total_iters == 0 { 1.0 } else { (step as f64 / total_iters as f64).min(1.0) };
                0.1_f64.powf(progress)
            }
        }
    }
}
