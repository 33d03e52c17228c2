use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "log_df.txt";
pub const METADATA_FILE: &str = "run_metadata.json";
pub const SESSION_FILE: &str = "trainer_session.json";

/// Filesystem layout of a run workspace.
///
/// ```text
/// <workspace>/
///   mesh/{mesh.obj,mesh.mtl,albedo.png}
///   results/*_{depth,rgb}.mp4
///   validation/*
///   log_df.txt
///   run_metadata.json
///   trainer_session.json
/// ```
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifier interpolated into object keys: the workspace as given.
    #[must_use]
    pub fn name(&self) -> String {
        self.root.to_string_lossy().trim_end_matches('/').to_string()
    }

    #[must_use]
    pub fn mesh_dir(&self) -> PathBuf {
        self.root.join("mesh")
    }

    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    #[must_use]
    pub fn validation_dir(&self) -> PathBuf {
        self.root.join("validation")
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    pub fn ensure_root(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
