//! Pipeline run identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shipwright_state::ContentDigest;
use std::path::PathBuf;

/// Identity of a pipeline run.
///
/// Two runs of the same workflow against the same commit and ref share a
/// spec digest, which is what the ledger groups runs by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineSpec {
    /// Workspace root path.
    pub workspace_path: PathBuf,

    /// SHA-256 digest of ordered step names (deterministic).
    pub steps_digest: String,

    /// Git commit SHA being deployed.
    pub git_sha: String,

    /// Git ref that triggered the run, e.g. `refs/heads/main`.
    pub trigger_ref: String,
}

impl PipelineSpec {
    /// Create a new pipeline specification.
    pub fn new(
        workspace_path: PathBuf,
        steps: &[String],
        git_sha: String,
        trigger_ref: String,
    ) -> Self {
        let steps_digest = compute_steps_digest(steps);
        Self {
            workspace_path,
            steps_digest,
            git_sha,
            trigger_ref,
        }
    }

    /// Content digest of the whole spec.
    pub fn digest(&self) -> ContentDigest {
        let mut buf = Vec::new();
        for part in [
            self.steps_digest.as_str(),
            self.git_sha.as_str(),
            self.trigger_ref.as_str(),
        ] {
            buf.extend_from_slice(part.as_bytes());
            buf.push(0);
        }
        ContentDigest::from_bytes(&buf)
    }
}

/// Compute deterministic digest of ordered step names.
fn compute_steps_digest(steps: &[String]) -> String {
    let mut hasher = Sha256::new();
    for step in steps {
        hasher.update(step.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
