//! Local hyperparameter files.
//!
//! Managed training platforms write hyperparameters to
//! `<root>/input/config/hyperparameters.json` and encode nested values as JSON
//! strings. Outside the platform a plain `<root>/parameters.json` is used.

use crate::error::TrainingResult;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_PLATFORM_ROOT: &str = "/opt/ml";
pub const LOCAL_HPARAMS: &str = "parameters.json";

/// Path of the hyperparameters file under `platform_root`.
pub fn hyperparameters_path(platform_root: &Path) -> PathBuf {
    let platform = platform_root.join("input").join("config").join("hyperparameters.json");
    if platform.exists() {
        platform
    } else {
        platform_root.join(LOCAL_HPARAMS)
    }
}

/// Read a hyperparameters file and expand string-encoded JSON values.
pub fn load_params(path: &Path) -> TrainingResult<Value> {
    let bytes = std::fs::read(path)?;
    let value: Value = serde_json::from_slice(&bytes)?;
    tracing::debug!(path = %path.display(), "loaded hyperparameters");
    Ok(parse_nested_json(value))
}

/// Recursively decode string values that are themselves JSON.
///
/// Single quotes are normalised to double quotes before decoding. Strings that
/// do not decode are kept as they are. Lists are not descended into.
pub fn parse_nested_json(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, parse_nested_json(v))).collect::<Map<_, _>>())
        }
        Value::String(s) => match serde_json::from_str::<Value>(&s.replace('\'', "\"")) {
            Ok(decoded) => parse_nested_json(decoded),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}
