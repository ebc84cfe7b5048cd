use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Snapshot '{0}' already exists and is never overwritten.")]
    AlreadyExists(String),

    #[error("'{0}' is not a forecast snapshot name.")]
    InvalidName(String),

    #[error("Snapshot '{0}' was not found in the store.")]
    NotFound(String),
}
