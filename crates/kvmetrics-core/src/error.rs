//! Error types produced by key-value store client operations

use thiserror::Error;

/// Error returned by a client's dial, command or pipeline execution
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, KvError>;
