//! Error types for pfem-io

use pfem_core::FemError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<IoError> for FemError {
    fn from(err: IoError) -> Self {
        FemError::Io(err.to_string())
    }
}
