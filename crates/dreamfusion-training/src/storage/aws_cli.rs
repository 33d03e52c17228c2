use super::{ObjectStore, ObjectUri};
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

/// Store backed by the `aws s3 cp` command.
///
/// Credentials and endpoint come from the usual AWS environment and profile
/// files; nothing is configured here beyond an optional region.
#[derive(Debug, Clone)]
pub struct AwsCliStore {
    program: String,
    region: Option<String>,
}

impl AwsCliStore {
    pub fn new(program: impl Into<String>, region: Option<String>) -> Self {
        Self { program: program.into(), region }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("s3").arg("cp").arg("--only-show-errors");
        if let Some(region) = &self.region {
            cmd.arg("--region").arg(region);
        }
        cmd
    }

    /// Run `cmd` for `uri`; a launch failure or non-zero exit is a storage error.
    async fn run(&self, mut cmd: Command, uri: &ObjectUri) -> TrainingResult<Output> {
        let output = cmd
            .output()
            .await
            .map_err(|e| TrainingError::storage(uri, format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!("{} exited with {}: {}", self.program, output.status, stderr.trim());
            return Err(TrainingError::storage(uri, reason));
        }
        Ok(output)
    }
}

#[async_trait]
impl ObjectStore for AwsCliStore {
    async fn get_object(&self, uri: &ObjectUri) -> TrainingResult<Vec<u8>> {
        let mut cmd = self.command();
        cmd.arg(uri.to_string()).arg("-");
        Ok(self.run(cmd, uri).await?.stdout)
    }

    async fn put_file(&self, local: &Path, uri: &ObjectUri) -> TrainingResult<()> {
        if !local.is_file() {
            return Err(TrainingError::storage(uri, format!("no such file: {}", local.display())));
        }

        let mut cmd = self.command();
        cmd.arg(local).arg(uri.to_string());
        self.run(cmd, uri).await?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "aws-cli"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_local_file_is_an_error() {
        let store = AwsCliStore::new("aws", None);
        let err = store
            .put_file(Path::new("/definitely/not/here.obj"), &ObjectUri::new("b", "k"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[tokio::test]
    async fn test_failing_program_reports_status() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("mesh.obj");
        std::fs::write(&file, "v 0 0 0\n").unwrap();

        let store = AwsCliStore::new("false", None);
        let err = store.put_file(&file, &ObjectUri::new("b", "k")).await.unwrap_err();
        assert!(matches!(err, TrainingError::Storage { .. }));
        assert!(err.to_string().contains("false exited with"));

        let err = store.get_object(&ObjectUri::new("b", "params.json")).await.unwrap_err();
        assert!(err.to_string().contains("s3://b/params.json"));
        assert!(err.to_string().contains("false exited with"));
    }

    #[tokio::test]
    async fn test_get_object_reads_stdout() {
        // `echo` prints its arguments, which stands in for the object body.
        let store = AwsCliStore::new("echo", None);
        let body = store.get_object(&ObjectUri::new("b", "params.json")).await.unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains("s3://b/params.json"));
    }
}
