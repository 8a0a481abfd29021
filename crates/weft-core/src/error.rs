//! Weft error types.

use thiserror::Error;

/// All errors produced by Weft crates.
#[derive(Debug, Error)]
pub enum WeftError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Action error: {0}")]
    Action(String),

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Market data error: {0}")]
    Market(String),

    #[error("Chain data error: {0}")]
    Chain(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, WeftError>;
