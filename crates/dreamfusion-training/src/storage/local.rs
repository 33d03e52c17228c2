use super::{ObjectStore, ObjectUri};
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Store that keeps objects under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the store and its root directory.
    pub fn new_and_init(root: PathBuf) -> TrainingResult<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `uri`. Keys may not escape their bucket.
    pub fn path_for(&self, uri: &ObjectUri) -> TrainingResult<PathBuf> {
        let key = Path::new(&uri.key);
        let escapes = key
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes || uri.bucket.contains(['/', '\\']) || uri.bucket == ".." {
            return Err(TrainingError::storage(uri, "object path escapes the store root"));
        }
        Ok(self.root.join(&uri.bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get_object(&self, uri: &ObjectUri) -> TrainingResult<Vec<u8>> {
        let path = self.path_for(uri)?;
        tokio::fs::read(&path).await.map_err(|e| TrainingError::storage(uri, e))
    }

    async fn put_file(&self, local: &Path, uri: &ObjectUri) -> TrainingResult<()> {
        let path = self.path_for(uri)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| TrainingError::storage(uri, e))?;
        }
        tokio::fs::copy(local, &path)
            .await
            .map_err(|e| TrainingError::storage(uri, format!("{}: {e}", local.display())))?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
