//! Error types for shipwright-state

use thiserror::Error;

/// Errors that can occur in the run ledger
#[derive(Error, Debug)]
pub enum StorageError {
    /// No run with this ID exists
    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// Run is in a state that does not allow the requested transition
    #[error("run {run_id} is {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    /// Run ID is not a UUID
    #[error("invalid run id: {run_id}")]
    InvalidRunId { run_id: String },

    /// String is not a 64-char hex SHA-256 digest
    #[error("invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
