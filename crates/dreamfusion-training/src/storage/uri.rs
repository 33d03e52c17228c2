use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of an object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectUri {
    pub bucket: String,
    pub key: String,
}

impl ObjectUri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }

    /// Parse `s3://bucket/key`.
    pub fn parse(uri: &str) -> TrainingResult<Self> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| TrainingError::storage(uri, "expected an s3:// uri"))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| TrainingError::storage(uri, "missing object key"))?;
        if bucket.is_empty() || key.is_empty() {
            return Err(TrainingError::storage(uri, "bucket and key must be non-empty"));
        }
        Ok(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
