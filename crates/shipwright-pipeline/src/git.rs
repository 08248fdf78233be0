//! Git integration for recording which commit a run deploys.

use std::path::Path;
use std::process::Command;

use crate::error::{PipelineError, Result};

/// Capture the HEAD commit SHA of the repository containing `repo_dir`.
///
/// Fails when the directory is not inside a git repository or git is not
/// installed.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| PipelineError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Git(format!(
            "git rev-parse HEAD failed: {}",
            stderr.trim()
        )));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(PipelineError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }

    Ok(sha)
}
