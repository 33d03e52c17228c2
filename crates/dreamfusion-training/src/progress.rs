use crate::trainer::TrainerStage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { workspace: String },
    Stage { workspace: String, stage: TrainerStage },
    Message { workspace: String, message: String },
    Uploaded { workspace: String, local: String, uri: String },
    UploadFailed { workspace: String, local: String, error: String },
    Finished { workspace: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { workspace } => println!("[run:{workspace}] started"),
            ProgressEvent::Stage { workspace, stage } => println!("[run:{workspace}] {stage}"),
            ProgressEvent::Message { workspace, message } => println!("[run:{workspace}] {message}"),
            ProgressEvent::Uploaded { workspace, local, uri } => {
                println!("[run:{workspace}] Uploaded {local} to {uri}");
            }
            ProgressEvent::UploadFailed { workspace, local, error } => {
                println!("[run:{workspace}] Error uploading {local}: {error}");
            }
            ProgressEvent::Finished { workspace } => println!("[run:{workspace}] finished"),
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
