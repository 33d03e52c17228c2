//! Object storage backends.
//!
//! Runs read their remote parameters from, and publish their artifacts to, an
//! S3-style bucket. `AwsCliStore` talks to the real service through the `aws`
//! command line, `LocalStore` mirrors buckets into a directory and
//! `InMemoryStore` records everything for tests.

mod aws_cli;
mod local;
mod memory;
mod uri;

pub use aws_cli::AwsCliStore;
pub use local::LocalStore;
pub use memory::InMemoryStore;
pub use uri::ObjectUri;

use crate::error::TrainingResult;
use crate::settings::{DriverSettings, StoreKind};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a whole object.
    async fn get_object(&self, uri: &ObjectUri) -> TrainingResult<Vec<u8>>;

    /// Upload a local file to `uri`, replacing any existing object.
    async fn put_file(&self, local: &Path, uri: &ObjectUri) -> TrainingResult<()>;

    fn backend_type(&self) -> &'static str;
}

/// Build the store selected by `settings`.
pub fn build_store(settings: &DriverSettings) -> TrainingResult<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match settings.store {
        StoreKind::AwsCli => {
            Arc::new(AwsCliStore::new(settings.aws_program.clone(), settings.region.clone()))
        }
        StoreKind::Local => Arc::new(LocalStore::new_and_init(settings.local_store_root.clone())?),
    };
    tracing::debug!(backend = store.backend_type(), "object store ready");
    Ok(store)
}
