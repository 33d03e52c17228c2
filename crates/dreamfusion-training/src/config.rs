//! Run configuration and the schema-checked override merge.
//!
//! `RunConfig` is the flat record of every option a run accepts. Field names
//! on the wire (JSON documents, CLI flags) are the historical option names, so
//! `O`, `O2`, `W`, `H`, `w` and `h` keep their case.

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields that may legitimately be `null`.
const NULLABLE_FIELDS: &[&str] = &["text", "hf_key"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub text: Option<String>,
    pub negative: String,
    #[serde(rename = "O")]
    pub optimize: bool,
    #[serde(rename = "O2")]
    pub optimize_vanilla: bool,
    pub test: bool,
    pub eval_interval: u32,
    pub workspace: String,
    pub guidance: String,
    pub seed: u64,

    pub save_mesh: bool,
    pub mcubes_resolution: u32,
    pub decimate_target: u64,

    // training
    pub iters: u64,
    pub lr: f64,
    pub warm_iters: u64,
    pub min_lr: f64,
    pub ckpt: String,
    pub cuda_ray: bool,
    pub taichi_ray: bool,
    pub max_steps: u32,
    pub num_steps: u32,
    pub upsample_steps: u32,
    pub update_extra_interval: u32,
    pub max_ray_batch: u32,
    pub albedo: bool,
    pub albedo_iters: u64,
    pub jitter_pose: bool,
    pub uniform_sphere_rate: f64,

    // model
    pub bg_radius: f64,
    pub density_activation: String,
    pub density_thresh: f64,
    pub blob_density: f64,
    pub blob_radius: f64,

    // backbone
    pub fp16: bool,
    pub backbone: String,
    pub optim: String,
    pub sd_version: String,
    pub hf_key: Option<String>,
    #[serde(rename = "w")]
    pub train_width: u32,
    #[serde(rename = "h")]
    pub train_height: u32,

    // dataset
    pub bound: f64,
    pub dt_gamma: f64,
    pub min_near: f64,
    pub radius_range: Vec<f64>,
    pub fovy_range: Vec<f64>,
    pub dir_text: bool,
    pub suppress_face: bool,
    pub angle_overhead: f64,
    pub angle_front: f64,

    // regularizations
    pub lambda_entropy: f64,
    pub lambda_opacity: f64,
    pub lambda_orient: f64,
    pub lambda_tv: f64,

    // gui
    pub gui: bool,
    #[serde(rename = "W")]
    pub gui_width: u32,
    #[serde(rename = "H")]
    pub gui_height: u32,
    pub radius: f64,
    pub fovy: f64,
    pub light_theta: f64,
    pub light_phi: f64,
    pub max_spp: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            text: None,
            negative: String::new(),
            optimize: false,
            optimize_vanilla: false,
            test: false,
            eval_interval: 1,
            workspace: "workspace".to_string(),
            guidance: "stable-diffusion".to_string(),
            seed: 0,
            save_mesh: false,
            mcubes_resolution: 256,
            decimate_target: 100_000,
            iters: 10_000,
            lr: 1e-3,
            warm_iters: 500,
            min_lr: 1e-4,
            ckpt: "latest".to_string(),
            cuda_ray: false,
            taichi_ray: false,
            max_steps: 1024,
            num_steps: 64,
            upsample_steps: 32,
            update_extra_interval: 16,
            max_ray_batch: 4096,
            albedo: false,
            albedo_iters: 1000,
            jitter_pose: false,
            uniform_sphere_rate: 0.5,
            bg_radius: 1.4,
            density_activation: "softplus".to_string(),
            density_thresh: 0.1,
            blob_density: 10.0,
            blob_radius: 0.5,
            fp16: false,
            backbone: "grid".to_string(),
            optim: "adan".to_string(),
            sd_version: "2.1".to_string(),
            hf_key: None,
            train_width: 128,
            train_height: 128,
            bound: 1.0,
            dt_gamma: 0.0,
            min_near: 0.1,
            radius_range: vec![1.0, 1.5],
            fovy_range: vec![40.0, 70.0],
            dir_text: false,
            suppress_face: false,
            angle_overhead: 30.0,
            angle_front: 60.0,
            lambda_entropy: 1e-4,
            lambda_opacity: 0.0,
            lambda_orient: 1e-2,
            lambda_tv: 0.0,
            gui: false,
            gui_width: 800,
            gui_height: 800,
            radius: 3.0,
            fovy: 60.0,
            light_theta: 60.0,
            light_phi: 0.0,
            max_spp: 1,
        }
    }
}

/// Result of merging an override document onto a configuration.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub config: RunConfig,
    /// Keys that named a field and were written.
    pub applied: Vec<String>,
    /// Keys with no matching field.
    pub ignored: Vec<String>,
}

impl RunConfig {
    /// Apply a partial record of overrides onto this configuration.
    ///
    /// Only keys naming an existing field are written; the rest are reported in
    /// `ignored`. Values are checked against the field's type. Strings holding a
    /// value of the right type (`"5000"`, `"true"`, `"[1.0, 1.5]"`) are coerced.
    pub fn merge_overrides(&self, overrides: &Map<String, Value>) -> TrainingResult<MergedConfig> {
        let Value::Object(mut fields) = serde_json::to_value(self)? else {
            return Err(TrainingError::Params("run configuration is not a record".to_string()));
        };

        let mut applied = Vec::new();
        let mut ignored = Vec::new();

        for (key, value) in overrides {
            let Some(slot) = fields.get_mut(key) else {
                ignored.push(key.clone());
                continue;
            };
            let nullable = NULLABLE_FIELDS.contains(&key.as_str());
            *slot = coerce_to_slot(key, slot, value, nullable)?;
            applied.push(key.clone());
        }

        let config: Self = match serde_json::from_value(Value::Object(fields.clone())) {
            Ok(config) => config,
            Err(e) => return Err(self.rejected_override(&fields, &applied, &e)),
        };

        Ok(MergedConfig { config, applied, ignored })
    }

    /// Find which applied key the record refuses, by setting each one alone.
    fn rejected_override(
        &self,
        fields: &Map<String, Value>,
        applied: &[String],
        error: &serde_json::Error,
    ) -> TrainingError {
        let Ok(Value::Object(base)) = serde_json::to_value(self) else {
            return invalid(&applied.join(", "), error.to_string());
        };
        for key in applied {
            let mut trial = base.clone();
            if let Some(value) = fields.get(key) {
                trial.insert(key.clone(), value.clone());
            }
            if let Err(e) = serde_json::from_value::<Self>(Value::Object(trial)) {
                return invalid(key, e.to_string());
            }
        }
        invalid(&applied.join(", "), error.to_string())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TrainingError {
    TrainingError::InvalidOverride { field: field.to_string(), reason: reason.into() }
}

/// Convert `value` so it has the same JSON type as the field currently in `slot`.
fn coerce_to_slot(field: &str, slot: &Value, value: &Value, nullable: bool) -> TrainingResult<Value> {
    if value.is_null() {
        return if nullable { Ok(Value::Null) } else { Err(invalid(field, "null is not allowed")) };
    }

    match slot {
        // Unset optional text fields.
        Value::Null => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            other => Err(invalid(field, format!("expected a string, got {other}"))),
        },
        Value::String(_) => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(invalid(field, format!("expected a string, got {other}"))),
        },
        Value::Bool(_) => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => parse_bool(s)
                .map(Value::Bool)
                .ok_or_else(|| invalid(field, format!("expected a boolean, got {s:?}"))),
            other => Err(invalid(field, format!("expected a boolean, got {other}"))),
        },
        Value::Number(current) if current.is_f64() => {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(field, format!("expected a number, got {value}")))
        }
        Value::Number(_) => {
            let parsed = match value {
                Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
                Value::String(s) => {
                    let s = s.trim();
                    s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
                }
                _ => None,
            };
            parsed
                .map(|n| Value::Number(n.into()))
                .ok_or_else(|| invalid(field, format!("expected a non-negative integer, got {value}")))
        }
        Value::Array(_) => {
            let items = match value {
                Value::Array(items) => items.clone(),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(Value::Array(items)) => items,
                    _ => return Err(invalid(field, format!("expected a list of numbers, got {s:?}"))),
                },
                other => return Err(invalid(field, format!("expected a list of numbers, got {other}"))),
            };
            if items.iter().all(Value::is_number) {
                Ok(Value::Array(items))
            } else {
                Err(invalid(field, "list entries must be numbers"))
            }
        }
        Value::Object(_) => Err(invalid(field, "nested records are not configurable")),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}
