//! Pipeline step execution.

use crate::error::{PipelineError, Result};
use crate::package::package_directory;
use crate::stage::{StepAction, StepConfig};
use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

const REDACTED: &str = "***";

/// Result of a step execution.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step name.
    pub step_name: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout, secrets redacted.
    pub stdout: String,

    /// Captured stderr, secrets redacted.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StepResult {
    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Executes a single step.
pub struct StepRunner;

impl StepRunner {
    /// Execute a step and return the result.
    ///
    /// A command that runs and exits non-zero is a failed `StepResult`, not
    /// an error. Errors are reserved for steps that could not run at all:
    /// empty command, spawn failure, timeout, packaging failure.
    pub async fn execute(config: &StepConfig) -> Result<StepResult> {
        match &config.action {
            StepAction::Command { argv } => Self::execute_command(config, argv).await,
            StepAction::Package { source, output } => {
                let start = Instant::now();
                let (source, output) = (source.clone(), output.clone());
                // on timeout the blocking task is detached and left to finish
                let report = within_timeout(config, async move {
                    tokio::task::spawn_blocking(move || package_directory(&source, &output))
                        .await
                        .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?
                })
                .await?;

                Ok(StepResult {
                    step_name: config.name.clone(),
                    exit_code: 0,
                    stdout: format!(
                        "packaged {} file(s), {} bytes into {} (sha256 {})\n",
                        report.files,
                        report.bytes,
                        report.output.display(),
                        report.digest
                    ),
                    stderr: String::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    success: true,
                })
            }
        }
    }

    async fn execute_command(config: &StepConfig, argv: &[String]) -> Result<StepResult> {
        let start = Instant::now();

        if argv.is_empty() {
            return Err(PipelineError::EmptyCommand(config.name.clone()));
        }

        let exe = &argv[0];
        let args = &argv[1..];

        let mut command = Command::new(exe);
        command
            .args(args)
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        debug!(step = %config.name, exe = %exe, "spawning step");
        let child = command.spawn().map_err(|source| PipelineError::Spawn {
            step: config.name.clone(),
            source,
        })?;

        // dropping the future kills the child
        let output =
            within_timeout(config, async { Ok(child.wait_with_output().await?) }).await?;

        let secrets = config.secret_values();
        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = redact(&String::from_utf8_lossy(&output.stdout), &secrets);
        let stderr = redact(&String::from_utf8_lossy(&output.stderr), &secrets);

        Ok(StepResult {
            step_name: config.name.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
            success: output.status.success(),
        })
    }
}

/// Await `fut`, bounded by the step timeout unless it is 0.
async fn within_timeout<T>(
    config: &StepConfig,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if config.timeout_secs == 0 {
        return fut.await;
    }
    tokio::time::timeout(Duration::from_secs(config.timeout_secs), fut)
        .await
        .map_err(|_| PipelineError::Timeout {
            step: config.name.clone(),
            secs: config.timeout_secs,
        })?
}

/// Replace every occurrence of each secret with `***`.
pub fn redact(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        out = out.replace(secret.as_str(), REDACTED);
    }
    out
}
