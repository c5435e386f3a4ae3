use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid field `{0}`: expected KEY=VALUE")]
    InvalidField(String),
    #[error("Payload must be a JSON object")]
    PayloadNotObject,
    #[error("Draft not found: {0}")]
    DraftNotFound(String),
    #[error("Cannot read photo file {path}: {source}")]
    PhotoFile { path: String, source: io::Error },
    #[error(
        "Sync is not configured. Set FIELDSYNC_API_BASE_URL and the R2_* variables (R2_ACCOUNT_ID, R2_BUCKET, R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY)."
    )]
    SyncNotConfigured,
}
