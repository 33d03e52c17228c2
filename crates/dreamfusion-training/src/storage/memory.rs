use super::{ObjectStore, ObjectUri};
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// In-memory store for testing.
///
/// Records every upload attempt in order and can be told to fail uploads for
/// chosen keys.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<ObjectUri, Vec<u8>>>>,
    attempts: Arc<RwLock<Vec<(PathBuf, ObjectUri)>>>,
    failing_keys: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object.
    #[must_use]
    pub fn with_object(self, uri: ObjectUri, bytes: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(uri, bytes.into());
        }
        self
    }

    /// Make every upload to `key` fail.
    #[must_use]
    pub fn failing_on(self, key: impl Into<String>) -> Self {
        if let Ok(mut failing) = self.failing_keys.write() {
            failing.insert(key.into());
        }
        self
    }

    pub fn object(&self, uri: &ObjectUri) -> Option<Vec<u8>> {
        self.objects.read().ok().and_then(|o| o.get(uri).cloned())
    }

    /// Upload attempts in order, successful or not.
    pub fn attempts(&self) -> Vec<(PathBuf, ObjectUri)> {
        self.attempts.read().map(|a| a.clone()).unwrap_or_default()
    }

    /// Keys of stored objects, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|o| o.keys().map(|u| u.key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_object(&self, uri: &ObjectUri) -> TrainingResult<Vec<u8>> {
        self.object(uri).ok_or_else(|| TrainingError::storage(uri, "object not found"))
    }

    async fn put_file(&self, local: &Path, uri: &ObjectUri) -> TrainingResult<()> {
        self.attempts
            .write()
            .map_err(|e| TrainingError::storage(uri, e))?
            .push((local.to_path_buf(), uri.clone()));

        let failing = self
            .failing_keys
            .read()
            .map_err(|e| TrainingError::storage(uri, e))?
            .contains(&uri.key);
        if failing {
            return Err(TrainingError::storage(uri, "injected failure"));
        }

        let bytes = tokio::fs::read(local)
            .await
            .map_err(|e| TrainingError::storage(uri, format!("{}: {e}", local.display())))?;
        self.objects.write().map_err(|e| TrainingError::storage(uri, e))?.insert(uri.clone(), bytes);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
