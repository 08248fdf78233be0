//! Shipwright - push-to-main deploy pipeline CLI
//!
//! The `shipwright` command deploys a web app when code lands on the main
//! branch and publishes AI-generated documentation for it.
//!
//! ## Commands
//!
//! - `run`: execute a workflow and record it in the run ledger
//! - `package`: zip a directory into a deployable archive
//! - `docs`: generate and publish documentation
//! - `history`: list recorded runs
//! - `gate`: re-evaluate the gate for a recorded run
//! - `workflow`: print the default workflow as TOML

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shipwright_docgen::{DocGenerator, DocgenConfig};
use shipwright_pipeline::{
    capture_head_sha, obs, package_directory, AzureCredentials, DeploySettings, Pipeline,
    PipelineGate, PipelineSpec, Workflow,
};
use shipwright_state::{FsRunLedger, RunId, RunLedger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn, Level};

const CREDENTIALS_VAR: &str = "AZURE_CREDENTIALS";

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy on push to main and publish generated docs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the run ledger
    #[arg(
        long,
        global = true,
        env = "SHIPWRIGHT_LEDGER_DIR",
        default_value = ".shipwright"
    )]
    ledger_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow: install, package, login, deploy, document, clean up
    Run {
        /// Workflow file (default: built-in deploy-and-document workflow)
        #[arg(short, long)]
        workflow: Option<PathBuf>,

        #[command(flatten)]
        deploy: DeployArgs,

        /// Event that triggered the run
        #[arg(long, env = "GITHUB_EVENT_NAME", default_value = "push")]
        event: String,

        /// Git ref the event targets
        #[arg(long = "ref", env = "GITHUB_REF", default_value = "refs/heads/main")]
        git_ref: String,

        /// Run even when the trigger does not match
        #[arg(long)]
        force: bool,
    },

    /// Zip a directory into a deployable archive
    Package {
        /// Directory to package
        source: PathBuf,

        /// Archive to write
        output: PathBuf,
    },

    /// Generate documentation and publish it to Confluence
    Docs {
        /// File extensions to document
        #[arg(long = "ext", default_value = "py", value_delimiter = ',')]
        extensions: Vec<String>,
    },

    /// List recorded runs, newest first
    History {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Re-evaluate the gate for a recorded run
    Gate {
        /// Run ID
        run_id: String,
    },

    /// Print the built-in workflow as TOML
    Workflow {
        #[command(flatten)]
        deploy: DeployArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct DeployArgs {
    /// Web app to deploy to
    #[arg(long, env = "AZURE_WEBAPP_NAME")]
    app_name: Option<String>,

    /// Resource group containing the web app
    #[arg(long, env = "AZURE_RESOURCE_GROUP")]
    resource_group: Option<String>,

    /// Application directory to package and document
    #[arg(long, default_value = "app")]
    app_dir: PathBuf,

    /// Archive path for the packaged application
    #[arg(long = "package", default_value = "app.zip")]
    package_path: PathBuf,

    /// Python requirements file
    #[arg(long, default_value = "requirements.txt")]
    requirements: PathBuf,

    /// Title of the root documentation page
    #[arg(long, env = "ROOT_DOC_TITLE", default_value = "Project Documentation")]
    doc_title: String,
}

impl DeployArgs {
    fn settings(&self) -> Result<DeploySettings> {
        let app_name = self
            .app_name
            .clone()
            .context("--app-name or AZURE_WEBAPP_NAME is required")?;
        let resource_group = self
            .resource_group
            .clone()
            .context("--resource-group or AZURE_RESOURCE_GROUP is required")?;

        let mut settings = DeploySettings::new(app_name, resource_group);
        settings.app_dir = self.app_dir.clone();
        settings.package_path = self.package_path.clone();
        settings.requirements = self.requirements.clone();
        settings.doc_title = self.doc_title.clone();
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local runs keep secrets in .env; CI injects them directly.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipwright_pipeline::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            workflow,
            deploy,
            event,
            git_ref,
            force,
        } => {
            cmd_run(
                &cli.ledger_dir,
                workflow.as_deref(),
                &deploy,
                &event,
                &git_ref,
                force,
            )
            .await
        }
        Commands::Package { source, output } => cmd_package(&source, &output),
        Commands::Docs { extensions } => cmd_docs(&extensions).await,
        Commands::History { limit } => cmd_history(&cli.ledger_dir, limit).await,
        Commands::Gate { run_id } => cmd_gate(&cli.ledger_dir, &run_id).await,
        Commands::Workflow { deploy } => cmd_workflow(&deploy),
    }
}

fn open_ledger(ledger_dir: &Path) -> Result<Arc<dyn RunLedger>> {
    let ledger = FsRunLedger::open(ledger_dir)
        .with_context(|| format!("Failed to open run ledger at {}", ledger_dir.display()))?;
    Ok(Arc::new(ledger))
}

/// Built-in workflow; the docs step re-invokes this binary.
fn default_workflow(deploy: &DeployArgs, credentials: Option<&AzureCredentials>) -> Result<Workflow> {
    let settings = deploy.settings()?;
    let exe = std::env::current_exe().context("Cannot locate the shipwright executable")?;
    let docs_command = vec![exe.to_string_lossy().into_owned(), "docs".to_string()];
    Ok(Workflow::deploy_and_document(
        &settings,
        credentials,
        docs_command,
    ))
}

async fn cmd_run(
    ledger_dir: &Path,
    workflow_path: Option<&Path>,
    deploy: &DeployArgs,
    event: &str,
    git_ref: &str,
    force: bool,
) -> Result<()> {
    let workflow = match workflow_path {
        Some(path) => Workflow::load(path)
            .with_context(|| format!("Failed to load workflow {}", path.display()))?,
        None => {
            let credentials = AzureCredentials::from_env(CREDENTIALS_VAR)
                .with_context(|| format!("{} is not valid", CREDENTIALS_VAR))?;
            if credentials.is_none() {
                warn!("{} not set, relying on an existing az session", CREDENTIALS_VAR);
            }
            default_workflow(deploy, credentials.as_ref())?
        }
    };

    if !workflow.trigger.matches(event, git_ref) {
        if !force {
            println!(
                "Workflow '{}' is not triggered by {} on {}; nothing to do (use --force to run anyway)",
                workflow.name, event, git_ref
            );
            return Ok(());
        }
        warn!(event = %event, git_ref = %git_ref, "trigger does not match, running anyway");
    }

    let workspace = std::env::current_dir().context("Cannot read current directory")?;
    let git_sha = capture_head_sha(&workspace).unwrap_or_else(|e| {
        warn!(error = %e, "Could not determine git SHA");
        "unknown".to_string()
    });

    let spec = PipelineSpec::new(
        workspace.clone(),
        &workflow.step_names(),
        git_sha.clone(),
        git_ref.to_string(),
    );

    println!("Running workflow '{}' in {}", workflow.name, workspace.display());
    println!("Steps: {}", workflow.step_names().join(", "));
    println!("Git SHA: {}", git_sha);
    println!("Ref: {}", git_ref);
    println!();

    let ledger = open_ledger(ledger_dir)?;
    let result = Pipeline::run(ledger.clone(), &spec, &workflow.name, workflow.steps.clone())
        .await
        .context("Pipeline failed to run")?;

    println!("Run ID: {}", result.run_id);
    println!(
        "Status: {}",
        if result.success { "✓ PASSED" } else { "✗ FAILED" }
    );
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for step in &result.steps {
        let status = if step.passed() { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status, step.step_name, step.duration_ms, step.exit_code
        );
        if !step.passed() {
            for line in tail(&step.stderr, 20) {
                println!("      {}", line);
            }
        }
    }
    for name in &result.skipped {
        println!("  - {} (skipped)", name);
    }

    println!();
    println!(
        "Summary: {}/{} executed steps passed, {} skipped",
        result.passed_count(),
        result.steps.len(),
        result.skipped.len()
    );

    let passed = print_gate(ledger.as_ref(), &result.run_id).await?;

    if result.success && passed {
        println!("\n✓ Deployment complete!");
        Ok(())
    } else {
        anyhow::bail!("Workflow '{}' failed", workflow.name)
    }
}

async fn print_gate(ledger: &dyn RunLedger, run_id: &str) -> Result<bool> {
    let events = ledger
        .get_events(&RunId(run_id.to_string()))
        .await
        .with_context(|| format!("Failed to read events for run {}", run_id))?;

    let verdict = PipelineGate::evaluate(&events);
    obs::emit_gate_evaluated(run_id, verdict.violations.len(), verdict.passed);
    println!(
        "Gate: {}",
        if verdict.passed { "✓ PASSED" } else { "✗ FAILED" }
    );

    if !verdict.violations.is_empty() {
        println!("Violations:");
        for violation in &verdict.violations {
            println!("  - {}", violation);
        }
    }
    if !verdict.skipped.is_empty() {
        println!("Skipped: {}", verdict.skipped.join(", "));
    }

    Ok(verdict.passed)
}

fn tail(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].to_vec()
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(8).collect()
}

fn cmd_package(source: &Path, output: &Path) -> Result<()> {
    let report = package_directory(source, output)
        .with_context(|| format!("Failed to package {}", source.display()))?;

    println!(
        "✓ Packaged {} file(s), {} bytes into {}",
        report.files,
        report.bytes,
        report.output.display()
    );
    println!("  sha256: {}", report.digest);
    Ok(())
}

async fn cmd_docs(extensions: &[String]) -> Result<()> {
    let config = DocgenConfig::from_env().context("Documentation generator is not configured")?;
    debug!(config = ?config, "docgen configuration");

    let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
    let generator = DocGenerator::from_config(&config)?.with_extensions(&extensions);

    println!("Generating documentation for '{}'", config.code_root_path.display());
    println!("  Root page: {}", config.root_doc_title);
    println!("  Space: {}", config.space_key);

    let report = generator.run().await.context("Documentation run failed")?;

    println!();
    println!("Root page ID: {}", report.root_page_id);
    println!("Pages published: {}", report.pages_published);
    println!("Files documented: {}", report.files_documented);
    println!("Files skipped: {}", report.files_skipped);

    if report.is_clean() {
        println!("\n✓ Documentation published");
    } else {
        println!("Failures:");
        for failure in &report.failures {
            println!("  ✗ {}", failure);
        }
    }
    Ok(())
}

async fn cmd_history(ledger_dir: &Path, limit: usize) -> Result<()> {
    let ledger = open_ledger(ledger_dir)?;
    let runs = ledger.list_runs(None).await.context("Failed to list runs")?;

    if runs.is_empty() {
        println!("No runs recorded in {}", ledger_dir.display());
        return Ok(());
    }

    for run in runs.iter().take(limit) {
        let sha = run.metadata.git_sha.as_deref().unwrap_or("-");
        let short_sha = short_sha(sha);
        let duration = run
            .summary
            .as_ref()
            .map(|s| format!("{}ms, {} events", s.duration_ms, s.total_events))
            .unwrap_or_else(|| "in progress".to_string());
        println!(
            "{}  {:<9}  {}  {}  {}  ({})",
            run.run_id,
            run.status.to_string(),
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            short_sha,
            run.metadata.workflow_name,
            duration
        );
    }

    if runs.len() > limit {
        println!("... {} more", runs.len() - limit);
    }
    Ok(())
}

async fn cmd_gate(ledger_dir: &Path, run_id: &str) -> Result<()> {
    let ledger = open_ledger(ledger_dir)?;
    let run = ledger
        .get_run(&RunId(run_id.to_string()))
        .await
        .with_context(|| format!("Run not found: {}", run_id))?;

    println!("Run: {} ({})", run.run_id, run.metadata.workflow_name);
    println!("Status: {}", run.status);

    if print_gate(ledger.as_ref(), run_id).await? {
        Ok(())
    } else {
        anyhow::bail!("Gate failed for run {}", run_id)
    }
}

fn cmd_workflow(deploy: &DeployArgs) -> Result<()> {
    // Never render credentials; `run` adds the login step from the environment.
    let workflow = default_workflow(deploy, None)?;
    let toml = workflow.to_toml_string()?;
    println!(
        "# cloud_login is enabled at run time when {} is set",
        CREDENTIALS_VAR
    );
    print!("{}", toml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_pipeline::StepConfig;

    fn deploy_args() -> DeployArgs {
        DeployArgs {
            app_name: Some("my-app".to_string()),
            resource_group: Some("my-rg".to_string()),
            app_dir: PathBuf::from("app"),
            package_path: PathBuf::from("app.zip"),
            requirements: PathBuf::from("requirements.txt"),
            doc_title: "Project Documentation".to_string(),
        }
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "shipwright",
            "--ledger-dir",
            "/tmp/ledger",
            "run",
            "--app-name",
            "web",
            "--resource-group",
            "rg",
            "--ref",
            "refs/heads/feature",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.ledger_dir, PathBuf::from("/tmp/ledger"));
        match cli.command {
            Commands::Run {
                deploy,
                git_ref,
                force,
                workflow,
                ..
            } => {
                assert_eq!(deploy.app_name.as_deref(), Some("web"));
                assert_eq!(deploy.app_dir, PathBuf::from("app"));
                assert_eq!(git_ref, "refs/heads/feature");
                assert!(force);
                assert!(workflow.is_none());
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_docs_extensions_split() {
        let cli = Cli::try_parse_from(["shipwright", "docs", "--ext", "py,pyi"]).unwrap();
        match cli.command {
            Commands::Docs { extensions } => assert_eq!(extensions, vec!["py", "pyi"]),
            _ => panic!("expected docs command"),
        }
    }

    #[test]
    fn test_settings_require_app_name() {
        let mut args = deploy_args();
        args.app_name = None;
        let err = args.settings().unwrap_err();
        assert!(err.to_string().contains("AZURE_WEBAPP_NAME"));
    }

    #[test]
    fn test_default_workflow_invokes_docs_subcommand() {
        let workflow = default_workflow(&deploy_args(), None).unwrap();
        let docs = workflow
            .steps
            .iter()
            .find(|s| s.name == "generate_docs")
            .unwrap();
        assert_eq!(docs.command().unwrap().last().unwrap(), "docs");
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), vec!["b", "c"]);
        assert_eq!(tail("a", 5), vec!["a"]);
        assert!(tail("", 3).is_empty());
    }

    #[test]
    fn test_short_sha_counts_chars() {
        assert_eq!(short_sha("0123456789abcdef"), "01234567");
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha("ééééééééé"), "éééééééé");
    }

    #[test]
    fn test_cmd_package_writes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir(&app).unwrap();
        std::fs::write(app.join("main.py"), "print(1)\n").unwrap();
        let out = dir.path().join("app.zip");

        cmd_package(&app, &out).unwrap();
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_run_from_workflow_file_and_gate() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        let workflow_path = dir.path().join("wf.toml");
        let workflow = Workflow {
            name: "smoke".to_string(),
            trigger: Default::default(),
            steps: vec![StepConfig::custom(
                "hello".to_string(),
                vec!["echo".to_string(), "hello".to_string()],
                30,
            )],
        };
        std::fs::write(&workflow_path, workflow.to_toml_string().unwrap()).unwrap();

        cmd_run(
            &ledger_dir,
            Some(&workflow_path),
            &deploy_args(),
            "push",
            "refs/heads/main",
            false,
        )
        .await
        .unwrap();

        let ledger = open_ledger(&ledger_dir).unwrap();
        let runs = ledger.list_runs(None).await.unwrap();
        assert_eq!(runs.len(), 1);
        cmd_gate(&ledger_dir, &runs[0].run_id.0).await.unwrap();
        cmd_history(&ledger_dir, 5).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_failing_workflow_errors() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        let workflow_path = dir.path().join("wf.toml");
        let workflow = Workflow {
            name: "broken".to_string(),
            trigger: Default::default(),
            steps: vec![StepConfig::custom(
                "fail".to_string(),
                vec!["false".to_string()],
                30,
            )],
        };
        std::fs::write(&workflow_path, workflow.to_toml_string().unwrap()).unwrap();

        let err = cmd_run(
            &ledger_dir,
            Some(&workflow_path),
            &deploy_args(),
            "push",
            "refs/heads/main",
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("broken"));

        let runs = open_ledger(&ledger_dir)
            .unwrap()
            .list_runs(None)
            .await
            .unwrap();
        assert!(cmd_gate(&ledger_dir, &runs[0].run_id.0).await.is_err());
    }

    #[tokio::test]
    async fn test_run_skipped_when_trigger_does_not_match() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        let workflow_path = dir.path().join("wf.toml");
        let workflow = Workflow {
            name: "main-only".to_string(),
            trigger: Default::default(),
            steps: vec![StepConfig::custom(
                "fail".to_string(),
                vec!["false".to_string()],
                30,
            )],
        };
        std::fs::write(&workflow_path, workflow.to_toml_string().unwrap()).unwrap();

        cmd_run(
            &ledger_dir,
            Some(&workflow_path),
            &deploy_args(),
            "push",
            "refs/heads/feature",
            false,
        )
        .await
        .unwrap();

        let runs = open_ledger(&ledger_dir)
            .unwrap()
            .list_runs(None)
            .await
            .unwrap();
        assert!(runs.is_empty());
    }
}
