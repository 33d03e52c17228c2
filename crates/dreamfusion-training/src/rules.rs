//! Derived-flag rules.
//!
//! Shorthand flags and a few options imply other options. The rules run in a
//! fixed order over an immutable base configuration and produce a new one.

use crate::config::RunConfig;
use crate::error::{TrainingError, TrainingResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedRule {
    /// `-O`: half precision, direction-conditioned text, CUDA ray marching.
    Optimize,
    /// `-O2`: half precision, direction-conditioned text, vanilla backbone.
    OptimizeVanilla,
    /// `--albedo`: albedo shading for the whole run.
    AlbedoOnly,
    /// `--backbone grid_taichi`: Taichi ray marching replaces CUDA.
    TaichiRayMarching,
}

/// Rules in application order.
pub const RULES: [DerivedRule; 4] = [
    DerivedRule::Optimize,
    DerivedRule::OptimizeVanilla,
    DerivedRule::AlbedoOnly,
    DerivedRule::TaichiRayMarching,
];

impl DerivedRule {
    pub fn applies_to(self, config: &RunConfig) -> bool {
        match self {
            Self::Optimize => config.optimize,
            Self::OptimizeVanilla => config.optimize_vanilla,
            Self::AlbedoOnly => config.albedo,
            Self::TaichiRayMarching => config.backbone == "grid_taichi",
        }
    }

    fn apply(self, mut config: RunConfig) -> RunConfig {
        match self {
            Self::Optimize => {
                config.fp16 = true;
                config.dir_text = true;
                config.cuda_ray = true;
            }
            Self::OptimizeVanilla => {
                config.fp16 = true;
                config.dir_text = true;
                config.backbone = "vanilla".to_string();
            }
            Self::AlbedoOnly => config.albedo_iters = config.iters,
            Self::TaichiRayMarching => {
                config.cuda_ray = false;
                config.taichi_ray = true;
            }
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct DerivedConfig {
    pub config: RunConfig,
    pub applied: Vec<DerivedRule>,
}

/// Apply every rule in [`RULES`] order.
///
/// `-O` and `-O2` write overlapping fields with different intent, so a
/// configuration with both set is rejected.
pub fn apply_rules(base: &RunConfig) -> TrainingResult<DerivedConfig> {
    if base.optimize && base.optimize_vanilla {
        return Err(TrainingError::ConflictingShorthands(
            "-O and --O2 both set; choose one".to_string(),
        ));
    }

    let mut config = base.clone();
    let mut applied = Vec::new();
    for rule in RULES {
        if rule.applies_to(&config) {
            tracing::debug!(?rule, "applying derived rule");
            config = rule.apply(config);
            applied.push(rule);
        }
    }

    Ok(DerivedConfig { config, applied })
}
