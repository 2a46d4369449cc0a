use thiserror::Error;

/// Error taxonomy for the pipeline.
///
/// Data-level problems (schema mismatch, bad rows) are not errors: they are
/// absorbed into quarantine artifacts and surfaced through `FileOutcome`.
/// Everything here either halts the run directly or is converted into an
/// `InfrastructureFailure` outcome by the orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Schema registry error: {0}")]
    Registry(String),

    #[error("Warehouse store error: {0}")]
    Store(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
