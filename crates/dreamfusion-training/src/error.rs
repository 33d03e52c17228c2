use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid override for `{field}`: {reason}")]
    InvalidOverride { field: String, reason: String },

    #[error("invalid hyperparameters document: {0}")]
    Params(String),

    #[error("--{option} {value} is not implemented")]
    NotImplemented { option: &'static str, value: String },

    #[error("conflicting shorthand flags: {0}")]
    ConflictingShorthands(String),

    #[error("run metadata: {0}")]
    Metadata(String),

    #[error("object storage error for {uri}: {reason}")]
    Storage { uri: String, reason: String },

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    pub(crate) fn storage(uri: impl ToString, reason: impl ToString) -> Self {
        Self::Storage { uri: uri.to_string(), reason: reason.to_string() }
    }
}
