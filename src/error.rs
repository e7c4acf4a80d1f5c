//! Error types for the transfer service.

use thiserror::Error;

/// Error types for transfer operations
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File extension not allowed: {0}")]
    DisallowedExtension(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("No store has capacity for {required} bytes")]
    CapacityExceeded { required: u64 },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid filename: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
