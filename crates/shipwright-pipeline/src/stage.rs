//! Pipeline step definitions and configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Builtin steps of the deploy-and-document workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStep {
    /// pip install -r requirements.txt
    InstallDependencies,

    /// zip the application directory
    Package,

    /// az login --service-principal
    CloudLogin,

    /// az webapp deploy --type zip
    Deploy,

    /// shipwright docs
    GenerateDocs,

    /// az logout
    Logout,

    /// az cache purge
    PurgeCache,
}

impl BuiltinStep {
    /// All builtin steps in workflow order.
    pub const ALL: [BuiltinStep; 7] = [
        BuiltinStep::InstallDependencies,
        BuiltinStep::Package,
        BuiltinStep::CloudLogin,
        BuiltinStep::Deploy,
        BuiltinStep::GenerateDocs,
        BuiltinStep::Logout,
        BuiltinStep::PurgeCache,
    ];

    /// Get the step name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStep::InstallDependencies => "install_dependencies",
            BuiltinStep::Package => "package",
            BuiltinStep::CloudLogin => "cloud_login",
            BuiltinStep::Deploy => "deploy",
            BuiltinStep::GenerateDocs => "generate_docs",
            BuiltinStep::Logout => "logout",
            BuiltinStep::PurgeCache => "purge_cache",
        }
    }

    /// Default timeout in seconds.
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            BuiltinStep::InstallDependencies => 600,
            BuiltinStep::Package => 300,
            BuiltinStep::CloudLogin => 120,
            BuiltinStep::Deploy => 900,
            BuiltinStep::GenerateDocs => 1800,
            BuiltinStep::Logout | BuiltinStep::PurgeCache => 60,
        }
    }

    /// Cleanup steps run regardless of earlier failures.
    pub fn always_run(&self) -> bool {
        matches!(self, BuiltinStep::Logout | BuiltinStep::PurgeCache)
    }
}

/// What a step does when executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Run an external command (first element is the executable).
    Command { argv: Vec<String> },

    /// Zip `source` recursively into `output`.
    Package { source: PathBuf, output: PathBuf },
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Configuration for a pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Human-readable step name.
    pub name: String,

    /// Timeout in seconds (0 disables the timeout).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether this step is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run even when an earlier step failed.
    #[serde(default)]
    pub always_run: bool,

    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Names of environment variables whose values must never appear in output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_env: Vec<String>,

    // tables last so the struct renders as valid TOML
    /// Extra environment variables for the child process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Command or builtin action.
    pub action: StepAction,

    /// Literal secret values to redact. Never serialized.
    #[serde(skip)]
    pub secrets: Vec<String>,
}

impl StepConfig {
    /// Create a custom command step.
    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            action: StepAction::Command { argv: command },
            timeout_secs,
            enabled: true,
            always_run: false,
            env: BTreeMap::new(),
            working_dir: None,
            secret_env: Vec::new(),
            secrets: Vec::new(),
        }
    }

    /// Create a command step named after a builtin.
    pub fn builtin(step: BuiltinStep, command: Vec<String>) -> Self {
        let config = Self::custom(
            step.name().to_string(),
            command,
            step.default_timeout_secs(),
        );
        if step.always_run() {
            config.always()
        } else {
            config
        }
    }

    /// Create a packaging step.
    pub fn package(name: String, source: PathBuf, output: PathBuf, timeout_secs: u64) -> Self {
        Self {
            action: StepAction::Package { source, output },
            ..Self::custom(name, Vec::new(), timeout_secs)
        }
    }

    /// Disable this step.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Run this step even after a failure.
    pub fn always(mut self) -> Self {
        self.always_run = true;
        self
    }

    /// Set an environment variable for the child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Redact `value` from captured output.
    pub fn with_secret(mut self, value: impl Into<String>) -> Self {
        self.secrets.push(value.into());
        self
    }

    /// Run the child process in `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The argv of a command step, if this is one.
    pub fn command(&self) -> Option<&[String]> {
        match &self.action {
            StepAction::Command { argv } => Some(argv),
            StepAction::Package { .. } => None,
        }
    }

    /// The action with secret values masked, safe to log or record.
    pub fn redacted_action(&self) -> StepAction {
        match &self.action {
            StepAction::Command { argv } => {
                let secrets = self.secret_values();
                StepAction::Command {
                    argv: argv
                        .iter()
                        .map(|arg| crate::runner::redact(arg, &secrets))
                        .collect(),
                }
            }
            other => other.clone(),
        }
    }

    /// Secret values to redact: literals plus the current values of `secret_env`.
    pub fn secret_values(&self) -> Vec<String> {
        let mut values: Vec<String> = self
            .secrets
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        for name in &self.secret_env {
            if let Some(v) = self.env.get(name).cloned().or_else(|| std::env::var(name).ok()) {
                if !v.is_empty() {
                    values.push(v);
                }
            }
        }
        values
    }
}
