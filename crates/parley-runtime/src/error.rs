//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `run` was called before any adapter was registered.
    #[error("No adapter registered, register at least one before running")]
    NoAdapters,

    /// Binding or serving the web-hook listener failed.
    #[error("Web-hook server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The web-hook base URL could not be parsed.
    #[error("Invalid web-hook base URL: {0}")]
    InvalidUrl(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
