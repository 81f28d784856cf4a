//! Error types for the reader-cfi tool

use thiserror::Error;

use crate::cfi::CfiError;
use crate::config::ConfigError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("CFI error: {0}")]
    Cfi(#[from] CfiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bad input on line {line}: {message}")]
    BadInput { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Cfi(_) | AppError::BadInput { .. } => 2,
            AppError::Config(_) => 3,
            AppError::Json(_) | AppError::Io(_) => 1,
        }
    }
}
