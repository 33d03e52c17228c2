//! Driver settings.
//!
//! Deployment-level knobs (where parameters live, which bucket receives
//! artifacts, how the trainer is launched) are kept out of the run flags and
//! read from a TOML file.
//!
//! Lookup order:
//! 1. An explicit path (`--settings`)
//! 2. `$DREAMFUSION_SETTINGS`
//! 3. `/opt/program/$CONFIG_PATH` (default `config_dev.toml`), if present
//! 4. Defaults
//!
//! `DREAMFUSION_BUCKET`, `DREAMFUSION_PARAMS_URI` and `DREAMFUSION_MIRROR_DIR`
//! override whatever was loaded.

use crate::error::{TrainingError, TrainingResult};
use crate::params::DEFAULT_PLATFORM_ROOT;
use crate::storage::ObjectUri;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PROGRAM_DIR: &str = "/opt/program";
pub const DEFAULT_CONFIG_FILE: &str = "config_dev.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    AwsCli,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Remote parameters document.
    pub params_uri: String,
    /// Bucket receiving artifacts.
    pub bucket: String,
    /// Key prefix for every artifact.
    pub key_prefix: String,
    /// Where the finished workspace is mirrored. Empty disables mirroring.
    pub mirror_dir: PathBuf,
    /// Root of the managed platform directory layout.
    pub platform_root: PathBuf,
    pub store: StoreKind,
    pub local_store_root: PathBuf,
    pub aws_program: String,
    pub region: Option<String>,
    /// Program launched for each trainer stage.
    pub trainer_program: String,
    pub trainer_args: Vec<String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            params_uri: "s3://jerry-3d-object-generation/params/parameters.json".to_string(),
            bucket: "jerry-3d-object-generation".to_string(),
            key_prefix: "stable-dreamfusion".to_string(),
            mirror_dir: PathBuf::from("/opt/ml/model"),
            platform_root: PathBuf::from(DEFAULT_PLATFORM_ROOT),
            store: StoreKind::AwsCli,
            local_store_root: PathBuf::from(".dreamfusion/store"),
            aws_program: "aws".to_string(),
            region: None,
            trainer_program: "python".to_string(),
            trainer_args: vec!["main.py".to_string()],
        }
    }
}

impl DriverSettings {
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrainingError::Settings(format!("{}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| TrainingError::Settings(format!("{}: {e}", path.display())))
    }

    /// Settings file that would be used when none is given explicitly.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DREAMFUSION_SETTINGS") {
            return Some(PathBuf::from(path));
        }
        let name = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let path = Path::new(PROGRAM_DIR).join(name);
        path.exists().then_some(path)
    }

    /// Load settings following the lookup order, then apply environment overrides.
    pub fn discover(explicit: Option<&Path>) -> TrainingResult<Self> {
        let path = explicit.map(Path::to_path_buf).or_else(Self::default_path);
        let mut settings = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading driver settings");
                Self::load_from_file(&path)?
            }
            None => Self::default(),
        };
        settings.apply_overrides_from(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Apply `DREAMFUSION_*` overrides using `lookup` to read variables.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup("DREAMFUSION_BUCKET") {
            self.bucket = bucket;
        }
        if let Some(uri) = lookup("DREAMFUSION_PARAMS_URI") {
            self.params_uri = uri;
        }
        if let Some(dir) = lookup("DREAMFUSION_MIRROR_DIR") {
            self.mirror_dir = PathBuf::from(dir);
        }
    }

    pub fn params_uri(&self) -> TrainingResult<ObjectUri> {
        ObjectUri::parse(&self.params_uri)
    }

    pub fn mirror_dir(&self) -> Option<&Path> {
        (!self.mirror_dir.as_os_str().is_empty()).then_some(self.mirror_dir.as_path())
    }
}
