//! Error types for pipeline definition and step execution.

use thiserror::Error;

/// Errors raised while loading a workflow or executing a single step.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Command step with no executable
    #[error("step {0} has empty command")]
    EmptyCommand(String),

    /// Step exceeded its timeout and was killed
    #[error("step {step} timed out after {secs} seconds")]
    Timeout { step: String, secs: u64 },

    /// Executable could not be started
    #[error("failed to spawn step {step}: {source}")]
    Spawn {
        step: String,
        #[source]
        source: std::io::Error,
    },

    /// Packaging source is missing or not a directory
    #[error("package source is not a directory: {0}")]
    PackageSource(String),

    /// Zip archive could not be written
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Workflow definition failed validation
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// Workflow file is not valid TOML for this schema
    #[error("workflow parse error: {0}")]
    WorkflowParse(#[from] toml::de::Error),

    /// Workflow could not be rendered as TOML
    #[error("workflow render error: {0}")]
    WorkflowRender(#[from] toml::ser::Error),

    /// Cloud credentials secret is malformed
    #[error("invalid cloud credentials: {0}")]
    Credentials(String),

    /// Git command failed or returned nothing
    #[error("git error: {0}")]
    Git(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = PipelineError::Timeout {
            step: "deploy".to_string(),
            secs: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("deploy"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn test_empty_command_display() {
        let err = PipelineError::EmptyCommand("package".to_string());
        assert_eq!(err.to_string(), "step package has empty command");
    }
}
