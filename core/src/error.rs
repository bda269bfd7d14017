use thiserror::Error;

#[derive(Error, Debug)]
pub enum AceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid transaction: field '{field}' {reason}")]
    InvalidTransaction { field: String, reason: String },

    #[error("Select at least one analysis mode")]
    NoModesSelected,

    #[error("Experiment dataset is empty")]
    EmptyDataset,

    #[error("Analyzer '{name}' failed: {reason}")]
    Analyzer { name: String, reason: String },

    #[error("Playbook conflict: expected version {expected}, found {actual}")]
    PlaybookConflict { expected: u64, actual: u64 },

    #[error("Feedback for analysis '{analysis_id}' already recorded")]
    DuplicateFeedback { analysis_id: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AceError {
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTransaction {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type AceResult<T> = Result<T, AceError>;
