use crate::config::{MergedConfig, RunConfig};
use crate::error::{TrainingError, TrainingResult};
use crate::params::{hyperparameters_path, load_params};
use crate::storage::{ObjectStore, ObjectUri};
use serde_json::Value;
use std::path::Path;

/// Merge a JSON document onto `base`. The document must be an object.
pub fn resolve_with(base: &RunConfig, document: &Value, source: &str) -> TrainingResult<MergedConfig> {
    let Value::Object(overrides) = document else {
        return Err(TrainingError::Params(format!("{source}: expected a JSON object")));
    };

    tracing::info!(%source, params = %document, "params");
    let merged = base.merge_overrides(overrides)?;
    if !merged.ignored.is_empty() {
        tracing::debug!(keys = ?merged.ignored, "ignoring unknown parameters");
    }
    tracing::info!(config = ?merged.config, "Final hyperparameters");
    Ok(merged)
}

/// Fetch the parameters document from object storage and merge it onto `base`.
pub async fn resolve_remote(
    base: &RunConfig,
    store: &dyn ObjectStore,
    uri: &ObjectUri,
) -> TrainingResult<MergedConfig> {
    let body = store.get_object(uri).await?;
    let document: Value = serde_json::from_slice(&body)?;
    resolve_with(base, &document, &uri.to_string())
}

/// Merge the platform (or local fallback) hyperparameters file onto `base`.
pub fn resolve_local(base: &RunConfig, platform_root: &Path) -> TrainingResult<MergedConfig> {
    let path = hyperparameters_path(platform_root);
    let document = load_params(&path)?;
    resolve_with(base, &document, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remote_overrides_cli_defaults() {
        let uri = ObjectUri::parse("s3://bucket/params/parameters.json").unwrap();
        let store = InMemoryStore::new()
            .with_object(uri.clone(), r#"{"text": "a hamburger", "iters": 2000, "unknown": true}"#);

        let base = RunConfig { seed: 7, ..RunConfig::default() };
        let merged = resolve_remote(&base, &store, &uri).await.unwrap();

        assert_eq!(merged.config.text.as_deref(), Some("a hamburger"));
        assert_eq!(merged.config.iters, 2000);
        assert_eq!(merged.config.seed, 7);
        assert_eq!(merged.ignored, vec!["unknown".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_errors_propagate() {
        let uri = ObjectUri::parse("s3://bucket/params/parameters.json").unwrap();
        let missing = resolve_remote(&RunConfig::default(), &InMemoryStore::new(), &uri).await;
        assert!(matches!(missing, Err(TrainingError::Storage { .. })));

        let store = InMemoryStore::new().with_object(uri.clone(), "not json");
        assert!(matches!(
            resolve_remote(&RunConfig::default(), &store, &uri).await,
            Err(TrainingError::Json(_))
        ));
    }

    #[test]
    fn test_non_object_document() {
        let err = resolve_with(&RunConfig::default(), &serde_json::json!([1, 2]), "x").unwrap_err();
        assert!(matches!(err, TrainingError::Params(_)));
    }

    #[test]
    fn test_local_platform_strings() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("input/config");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("hyperparameters.json"),
            r#"{"iters": "3000", "O": "true", "fovy_range": "[30, 60]", "text": "a cat"}"#,
        )
        .unwrap();

        let merged = resolve_local(&RunConfig::default(), temp.path()).unwrap();
        assert_eq!(merged.config.iters, 3000);
        assert!(merged.config.optimize);
        assert_eq!(merged.config.fovy_range, vec![30.0, 60.0]);
        assert_eq!(merged.config.text.as_deref(), Some("a cat"));
    }
}
