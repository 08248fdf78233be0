//! Pipeline orchestration and run recording.

use crate::recording::{RunRecorder, StepEvent};
use crate::runner::{StepResult, StepRunner};
use crate::spec::PipelineSpec;
use crate::stage::StepConfig;
use serde_json::json;
use shipwright_state::{RunLedger, RunMetadata, RunSummary, StorageError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Result of a complete pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Run ID in the ledger.
    pub run_id: String,

    /// Whether every executed step passed.
    pub success: bool,

    /// Results of executed steps, in order.
    pub steps: Vec<StepResult>,

    /// Regular steps skipped because an earlier step failed.
    pub skipped: Vec<String>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Digest of the pipeline specification.
    pub spec_digest: String,
}

impl PipelineResult {
    /// Number of steps that passed.
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.passed()).count()
    }

    /// Number of steps that failed.
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.passed()).count()
    }

    /// First failed step, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.passed())
    }
}

/// Linear pipeline orchestrator.
pub struct Pipeline;

impl Pipeline {
    /// Execute steps in order and record every step into the ledger.
    ///
    /// Each executed step produces one `step_started` event followed by
    /// `step_succeeded` or `step_failed`. Once a step fails, the remaining
    /// regular steps each produce a single `step_skipped` event; steps with
    /// `always_run` still execute. Disabled steps are not recorded.
    ///
    /// The run is finalized as Completed if nothing failed, else Failed.
    ///
    /// A ledger write error does not stop `always_run` steps. A regular step
    /// whose start cannot be recorded is not executed. The run is then
    /// marked Failed and the first ledger error is returned.
    pub async fn run(
        ledger: Arc<dyn RunLedger>,
        spec: &PipelineSpec,
        workflow_name: &str,
        steps: Vec<StepConfig>,
    ) -> anyhow::Result<PipelineResult> {
        let start = Instant::now();
        let spec_digest = spec.digest();

        let metadata = RunMetadata {
            git_sha: Some(spec.git_sha.clone()),
            workflow_name: workflow_name.to_string(),
            tags: json!({
                "steps": steps.iter().map(|s| &s.name).collect::<Vec<_>>(),
                "workspace": spec.workspace_path.to_string_lossy(),
                "ref": &spec.trigger_ref,
            }),
        };

        let mut recorder = RunRecorder::start(ledger, &spec_digest, metadata).await?;
        let run_id = recorder.run_id().to_string();

        info!(run_id = %run_id, workflow = %workflow_name, "Starting pipeline");

        let mut step_results = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = false;
        // first ledger write error; later steps still run so cleanup happens
        let mut storage_error: Option<StorageError> = None;

        for config in steps {
            if !config.enabled {
                info!(step = %config.name, "Skipping disabled step");
                continue;
            }

            if (failed || storage_error.is_some()) && !config.always_run {
                let reason = if failed {
                    "previous step failed"
                } else {
                    "run ledger unavailable"
                };
                info!(step = %config.name, reason, "Skipping step");
                record_or_note(
                    &mut recorder,
                    &mut storage_error,
                    StepEvent::Skipped,
                    &config.name,
                    json!({ "reason": reason }),
                )
                .await;
                skipped.push(config.name);
                continue;
            }

            info!(step = %config.name, always_run = config.always_run, "Executing step");
            let recorded = record_or_note(
                &mut recorder,
                &mut storage_error,
                StepEvent::Started,
                &config.name,
                json!({
                    "action": config.redacted_action(),
                    "timeout_secs": config.timeout_secs,
                    "always_run": config.always_run,
                }),
            )
            .await;
            if !recorded && !config.always_run {
                // an unrecorded deploy step is not run
                skipped.push(config.name);
                continue;
            }

            let step_start = Instant::now();
            let result = match StepRunner::execute(&config).await {
                Ok(r) => r,
                // Step could not run at all (spawn error, timeout, packaging).
                Err(e) => {
                    warn!(step = %config.name, error = %e, "Step execution error");
                    StepResult {
                        step_name: config.name.clone(),
                        exit_code: -1,
                        stdout: String::new(),
                        stderr: e.to_string(),
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        success: false,
                    }
                }
            };

            if result.passed() {
                record_or_note(
                    &mut recorder,
                    &mut storage_error,
                    StepEvent::Succeeded,
                    &config.name,
                    json!({
                        "exit_code": result.exit_code,
                        "stdout": &result.stdout,
                        "stderr": &result.stderr,
                        "duration_ms": result.duration_ms,
                    }),
                )
                .await;
            } else {
                failed = true;
                warn!(step = %config.name, exit_code = result.exit_code, "Step failed");
                record_or_note(
                    &mut recorder,
                    &mut storage_error,
                    StepEvent::Failed,
                    &config.name,
                    json!({
                        "exit_code": result.exit_code,
                        "stdout": &result.stdout,
                        "stderr": &result.stderr,
                        "duration_ms": result.duration_ms,
                        "error": format!("Step '{}' exited with code {}", config.name, result.exit_code),
                    }),
                )
                .await;
            }

            step_results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = !failed && storage_error.is_none();

        let summary = RunSummary {
            total_events: recorder.events_recorded(),
            duration_ms,
            success,
        };

        if let Some(err) = storage_error {
            if let Err(finish_err) = recorder.finish_err(summary).await {
                warn!(run_id = %run_id, error = %finish_err, "Could not mark run as failed");
            }
            warn!(run_id = %run_id, error = %err, "Pipeline aborted by ledger error");
            return Err(err.into());
        }

        if success {
            recorder.finish_ok(summary).await?;
            info!(run_id = %run_id, "Pipeline completed successfully");
        } else {
            recorder.finish_err(summary).await?;
            info!(run_id = %run_id, "Pipeline failed");
        }

        Ok(PipelineResult {
            run_id,
            success,
            steps: step_results,
            skipped,
            duration_ms,
            spec_digest: spec_digest.to_string(),
        })
    }
}

/// Record an event, keeping the first ledger error instead of returning it.
/// Returns whether the event was stored.
async fn record_or_note(
    recorder: &mut RunRecorder,
    storage_error: &mut Option<StorageError>,
    event: StepEvent,
    step_name: &str,
    payload: serde_json::Value,
) -> bool {
    match recorder.record(event, step_name, payload).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                step = %step_name,
                kind = event.kind(),
                error = %e,
                "Failed to record step event"
            );
            storage_error.get_or_insert(e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, exit_code: i32) -> StepResult {
        StepResult {
            step_name: name.to_string(),
            exit_code,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
            success: exit_code == 0,
        }
    }

    #[test]
    fn test_pipeline_result_counts() {
        let result = PipelineResult {
            run_id: "run123".to_string(),
            success: true,
            steps: vec![step("package", 0), step("deploy", 0)],
            skipped: vec![],
            duration_ms: 300,
            spec_digest: "abc123".to_string(),
        };

        assert_eq!(result.passed_count(), 2);
        assert_eq!(result.failed_count(), 0);
        assert!(result.first_failure().is_none());
    }

    #[test]
    fn test_pipeline_result_with_failures() {
        let result = PipelineResult {
            run_id: "run123".to_string(),
            success: false,
            steps: vec![step("package", 0), step("deploy", 1), step("logout", 0)],
            skipped: vec!["generate_docs".to_string()],
            duration_ms: 300,
            spec_digest: "abc123".to_string(),
        };

        assert_eq!(result.passed_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.first_failure().unwrap().step_name, "deploy");
    }
}
