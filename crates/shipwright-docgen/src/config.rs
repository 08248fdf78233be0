//! Documentation generator configuration
//!
//! Everything is read from environment variables so the generator can run
//! as a pipeline step with secrets injected by the caller.

use crate::error::{DocgenError, Result};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CODE_ROOT_PATH: &str = "app";
pub const DEFAULT_ROOT_DOC_TITLE: &str = "Project Documentation";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const REQUIRED: [&str; 5] = [
    "OPENAI_API_KEY",
    "CONFLUENCE_URL",
    "CONFLUENCE_EMAIL",
    "CONFLUENCE_API_TOKEN",
    "CONFLUENCE_SPACE_KEY",
];

/// Documentation generator configuration
#[derive(Clone)]
pub struct DocgenConfig {
    /// OpenAI API key
    pub openai_api_key: String,
    /// Chat model name
    pub openai_model: String,
    /// Override for the OpenAI API base URL
    pub openai_base_url: Option<String>,
    /// Confluence base URL, up to and including `/wiki`
    pub confluence_url: String,
    /// Atlassian account email for basic auth
    pub confluence_email: String,
    /// Confluence API token
    pub confluence_api_token: String,
    /// Target space key
    pub space_key: String,
    /// Directory to document, relative to `workspace`
    pub code_root_path: PathBuf,
    /// Title of the root documentation page
    pub root_doc_title: String,
    /// Repository checkout root
    pub workspace: PathBuf,
}

impl DocgenConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    ///
    /// All missing required variables are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DocgenError::MissingConfig(missing));
        }

        let required = |key: &str| get(key).unwrap_or_default();

        Ok(DocgenConfig {
            openai_api_key: required("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL"),
            confluence_url: required("CONFLUENCE_URL")
                .trim_end_matches('/')
                .to_string(),
            confluence_email: required("CONFLUENCE_EMAIL"),
            confluence_api_token: required("CONFLUENCE_API_TOKEN"),
            space_key: required("CONFLUENCE_SPACE_KEY"),
            code_root_path: PathBuf::from(
                get("CODE_ROOT_PATH").unwrap_or_else(|| DEFAULT_CODE_ROOT_PATH.to_string()),
            ),
            root_doc_title: get("ROOT_DOC_TITLE")
                .unwrap_or_else(|| DEFAULT_ROOT_DOC_TITLE.to_string()),
            workspace: PathBuf::from(get("GITHUB_WORKSPACE").unwrap_or_else(|| ".".to_string())),
        })
    }

    /// Directory whose contents get documented
    pub fn code_dir(&self) -> PathBuf {
        self.workspace.join(&self.code_root_path)
    }
}

impl fmt::Debug for DocgenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocgenConfig")
            .field("openai_api_key", &"<redacted>")
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("confluence_url", &self.confluence_url)
            .field("confluence_email", &self.confluence_email)
            .field("confluence_api_token", &"<redacted>")
            .field("space_key", &self.space_key)
            .field("code_root_path", &self.code_root_path)
            .field("root_doc_title", &self.root_doc_title)
            .field("workspace", &self.workspace)
            .finish()
    }
}
