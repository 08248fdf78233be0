//! Error types for shipwright-docgen

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a documentation run
#[derive(Error, Debug)]
pub enum DocgenError {
    /// Required environment variables are not set
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// The root documentation page could not be created or updated
    #[error("failed to create or update the root documentation page '{0}'")]
    RootPageFailed(String),

    /// The code root is not a directory
    #[error("code path '{}' is not a valid directory", .0.display())]
    NotADirectory(PathBuf),

    /// HTTP client construction failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DocgenError {
    fn from(err: reqwest::Error) -> Self {
        DocgenError::Http(err.to_string())
    }
}

/// Result type for docgen operations
pub type Result<T> = std::result::Result<T, DocgenError>;

/// Errors from the language model API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// HTTP 429; the call may be retried after a delay
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Non-success response other than 429
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response carried no completion text
    #[error("response contained no completion")]
    EmptyResponse,

    /// Network or decoding failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

/// Errors from the page store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// HTTP 409, usually a stale version number
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success response
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Network or decoding failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for PageError {
    fn from(err: reqwest::Error) -> Self {
        PageError::Transport(err.to_string())
    }
}
