//! Storage error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for llmrelay_core::Error {
    fn from(err: StorageError) -> Self {
        llmrelay_core::Error::Storage(err.to_string())
    }
}
