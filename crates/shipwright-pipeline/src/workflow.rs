//! Workflow definitions: trigger plus an ordered list of steps.
//!
//! A workflow is either loaded from a TOML file or built in code as the
//! default deploy-and-document workflow:
//!
//! ```toml
//! name = "deploy-and-document"
//!
//! [trigger]
//! event = "push"
//! branches = ["main"]
//!
//! [[step]]
//! name = "install_dependencies"
//! action = { type = "command", argv = ["python", "-m", "pip", "install", "-r", "requirements.txt"] }
//!
//! [[step]]
//! name = "logout"
//! always_run = true
//! action = { type = "command", argv = ["az", "logout"] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::credentials::AzureCredentials;
use crate::error::{PipelineError, Result};
use crate::stage::{BuiltinStep, StepAction, StepConfig};

/// Repository event that starts a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trigger {
    /// Event name, e.g. "push".
    pub event: String,

    /// Branches the event must target. Empty means any branch.
    #[serde(default)]
    pub branches: Vec<String>,
}

impl Trigger {
    /// Trigger on pushes to a single branch.
    pub fn push_to(branch: &str) -> Self {
        Self {
            event: "push".to_string(),
            branches: vec![branch.to_string()],
        }
    }

    /// Whether `event` on `git_ref` (`main` or `refs/heads/main`) fires this trigger.
    pub fn matches(&self, event: &str, git_ref: &str) -> bool {
        if self.event != event {
            return false;
        }
        if self.branches.is_empty() {
            return true;
        }
        let branch = git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref);
        self.branches.iter().any(|b| b == branch)
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::push_to("main")
    }
}

/// Deployment target and local paths for the default workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    /// Web app name.
    pub app_name: String,
    /// Resource group holding the web app.
    pub resource_group: String,
    /// Directory packaged and deployed.
    pub app_dir: PathBuf,
    /// Where the zip archive is written.
    pub package_path: PathBuf,
    /// pip requirements file.
    pub requirements: PathBuf,
    /// Root page title for generated documentation.
    pub doc_title: String,
}

impl DeploySettings {
    pub fn new(app_name: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            resource_group: resource_group.into(),
            app_dir: PathBuf::from("app"),
            package_path: PathBuf::from("app.zip"),
            requirements: PathBuf::from("requirements.txt"),
            doc_title: "Project Documentation".to_string(),
        }
    }
}

/// A named, triggered sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name, recorded on every run.
    pub name: String,

    /// When this workflow runs.
    #[serde(default)]
    pub trigger: Trigger,

    /// Steps in execution order.
    #[serde(rename = "step", default)]
    pub steps: Vec<StepConfig>,
}

impl Workflow {
    /// Parse and validate a workflow from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let workflow: Workflow = toml::from_str(s)?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Load a workflow file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading workflow");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML. Secret arguments are masked.
    pub fn to_toml_string(&self) -> Result<String> {
        let redacted = Workflow {
            steps: self
                .steps
                .iter()
                .map(|step| StepConfig {
                    action: step.redacted_action(),
                    ..step.clone()
                })
                .collect(),
            ..self.clone()
        };
        Ok(toml::to_string_pretty(&redacted)?)
    }

    /// Step names in order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    /// Reject workflows the pipeline cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidWorkflow(
                "name must not be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidWorkflow(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(PipelineError::InvalidWorkflow(
                    "step name must not be empty".to_string(),
                ));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::InvalidWorkflow(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
            match &step.action {
                StepAction::Command { argv } if argv.is_empty() => {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "step '{}' has empty command",
                        step.name
                    )));
                }
                StepAction::Package { source, output }
                    if source.as_os_str().is_empty() || output.as_os_str().is_empty() =>
                {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "step '{}' needs both source and output paths",
                        step.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The default push-to-main workflow: install, package, login, deploy,
    /// generate docs, then logout and purge the CLI cache no matter what.
    ///
    /// Without credentials the login step is disabled and the deploy relies
    /// on an existing CLI session.
    pub fn deploy_and_document(
        settings: &DeploySettings,
        credentials: Option<&AzureCredentials>,
        docs_command: Vec<String>,
    ) -> Self {
        let mut steps = Vec::new();

        steps.push(StepConfig::builtin(
            BuiltinStep::InstallDependencies,
            vec![
                "python".to_string(),
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                "-r".to_string(),
                settings.requirements.to_string_lossy().into_owned(),
            ],
        ));

        steps.push(StepConfig::package(
            BuiltinStep::Package.name().to_string(),
            settings.app_dir.clone(),
            settings.package_path.clone(),
            BuiltinStep::Package.default_timeout_secs(),
        ));

        let login = match credentials {
            Some(creds) => StepConfig::builtin(BuiltinStep::CloudLogin, creds.login_argv())
                .with_secret(creds.client_secret.clone()),
            None => StepConfig::builtin(
                BuiltinStep::CloudLogin,
                vec!["az".to_string(), "login".to_string()],
            )
            .disabled(),
        };
        steps.push(login);

        let mut deploy_argv = vec![
            "az".to_string(),
            "webapp".to_string(),
            "deploy".to_string(),
            "--resource-group".to_string(),
            settings.resource_group.clone(),
            "--name".to_string(),
            settings.app_name.clone(),
            "--src-path".to_string(),
            settings.package_path.to_string_lossy().into_owned(),
            "--type".to_string(),
            "zip".to_string(),
        ];
        if let Some(creds) = credentials {
            deploy_argv.push("--subscription".to_string());
            deploy_argv.push(creds.subscription_id.clone());
        }
        steps.push(StepConfig::builtin(BuiltinStep::Deploy, deploy_argv));

        let mut docs = StepConfig::builtin(BuiltinStep::GenerateDocs, docs_command)
            .with_env("CODE_ROOT_PATH", settings.app_dir.to_string_lossy())
            .with_env("ROOT_DOC_TITLE", settings.doc_title.clone());
        docs.secret_env = vec![
            "OPENAI_API_KEY".to_string(),
            "CONFLUENCE_API_TOKEN".to_string(),
        ];
        steps.push(docs);

        steps.push(StepConfig::builtin(
            BuiltinStep::Logout,
            vec!["az".to_string(), "logout".to_string()],
        ));
        steps.push(StepConfig::builtin(
            BuiltinStep::PurgeCache,
            vec!["az".to_string(), "cache".to_string(), "purge".to_string()],
        ));

        Workflow {
            name: "deploy-and-document".to_string(),
            trigger: Trigger::default(),
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> AzureCredentials {
        AzureCredentials::from_json(
            r#"{"clientId":"cid","clientSecret":"shh","tenantId":"tid","subscriptionId":"sub"}"#,
        )
        .unwrap()
    }

    fn default_workflow() -> Workflow {
        Workflow::deploy_and_document(
            &DeploySettings::new("my-app", "my-rg"),
            Some(&creds()),
            vec!["shipwright".to_string(), "docs".to_string()],
        )
    }

    #[test]
    fn test_trigger_matches_short_and_full_refs() {
        let trigger = Trigger::push_to("main");
        assert!(trigger.matches("push", "main"));
        assert!(trigger.matches("push", "refs/heads/main"));
        assert!(!trigger.matches("push", "refs/heads/feature"));
        assert!(!trigger.matches("pull_request", "refs/heads/main"));
    }

    #[test]
    fn test_trigger_without_branches_matches_any() {
        let trigger = Trigger {
            event: "push".to_string(),
            branches: vec![],
        };
        assert!(trigger.matches("push", "refs/heads/anything"));
    }

    #[test]
    fn test_default_workflow_order() {
        let workflow = default_workflow();
        assert_eq!(
            workflow.step_names(),
            vec![
                "install_dependencies",
                "package",
                "cloud_login",
                "deploy",
                "generate_docs",
                "logout",
                "purge_cache",
            ]
        );
        workflow.validate().unwrap();
    }

    #[test]
    fn test_default_workflow_cleanup_always_runs() {
        let workflow = default_workflow();
        let always: Vec<_> = workflow
            .steps
            .iter()
            .filter(|s| s.always_run)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(always, vec!["logout", "purge_cache"]);
    }

    #[test]
    fn test_default_workflow_deploy_command() {
        let workflow = default_workflow();
        let deploy = workflow.steps.iter().find(|s| s.name == "deploy").unwrap();
        let argv = deploy.command().unwrap();
        assert_eq!(&argv[..3], &["az", "webapp", "deploy"]);
        assert!(argv.windows(2).any(|w| w == ["--name", "my-app"]));
        assert!(argv.windows(2).any(|w| w == ["--resource-group", "my-rg"]));
        assert!(argv.windows(2).any(|w| w == ["--src-path", "app.zip"]));
        assert!(argv.windows(2).any(|w| w == ["--subscription", "sub"]));
    }

    #[test]
    fn test_login_disabled_without_credentials() {
        let workflow = Workflow::deploy_and_document(
            &DeploySettings::new("a", "b"),
            None,
            vec!["docs".to_string()],
        );
        let login = workflow
            .steps
            .iter()
            .find(|s| s.name == "cloud_login")
            .unwrap();
        assert!(!login.enabled);
    }

    #[test]
    fn test_login_step_redacts_client_secret() {
        let workflow = default_workflow();
        let login = workflow
            .steps
            .iter()
            .find(|s| s.name == "cloud_login")
            .unwrap();
        assert!(login.secret_values().contains(&"shh".to_string()));
    }

    #[test]
    fn test_docs_step_env() {
        let workflow = default_workflow();
        let docs = workflow
            .steps
            .iter()
            .find(|s| s.name == "generate_docs")
            .unwrap();
        assert_eq!(docs.env.get("CODE_ROOT_PATH").unwrap(), "app");
        assert_eq!(docs.env.get("ROOT_DOC_TITLE").unwrap(), "Project Documentation");
    }

    #[test]
    fn test_toml_round_trip_keeps_steps_but_not_secrets() {
        let workflow = default_workflow();
        let rendered = workflow.to_toml_string().unwrap();
        assert!(!rendered.contains("shh"));
        assert!(rendered.contains("***"));
        // the in-memory workflow still carries the real argument
        let login = workflow.steps.iter().find(|s| s.name == "cloud_login").unwrap();
        assert!(login.command().unwrap().contains(&"shh".to_string()));

        let parsed = Workflow::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.step_names(), workflow.step_names());
        assert_eq!(parsed.trigger, workflow.trigger);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            name = "smoke"

            [[step]]
            name = "hello"
            action = { type = "command", argv = ["echo", "hi"] }

            [[step]]
            name = "bundle"
            timeout_secs = 30
            action = { type = "package", source = "app", output = "out/app.zip" }
        "#;
        let workflow = Workflow::from_toml_str(toml).unwrap();
        assert_eq!(workflow.trigger, Trigger::push_to("main"));
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[0].timeout_secs, 600);
        assert!(workflow.steps[0].enabled);
        assert_eq!(workflow.steps[1].timeout_secs, 30);
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let toml = r#"
            name = "dup"

            [[step]]
            name = "a"
            action = { type = "command", argv = ["true"] }

            [[step]]
            name = "a"
            action = { type = "command", argv = ["true"] }
        "#;
        let err = Workflow::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let toml = r#"
            name = "empty"

            [[step]]
            name = "nothing"
            action = { type = "command", argv = [] }
        "#;
        let err = Workflow::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidWorkflow(_)));
    }

    #[test]
    fn test_no_steps_rejected() {
        let err = Workflow::from_toml_str("name = \"bare\"").unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }
}
