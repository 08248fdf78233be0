//! Structured observability hooks for pipeline run lifecycle events.
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG` and switch
//! to JSON lines with the CLI's `--json` flag.

use tracing::info;

/// Emit event: run started for a workflow.
pub fn emit_run_started(run_id: &str, workflow_name: &str) {
    info!(event = "run.started", run_id = %run_id, workflow = %workflow_name);
}

/// Emit event: run finished with duration, total events, and success status.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, total_events: u64, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        total_events = total_events,
        success = success,
    );
}

/// Emit event: a single event appended to the run.
pub fn emit_event_appended(run_id: &str, event_kind: &str, seq: u64) {
    info!(event = "run.event_appended", run_id = %run_id, kind = %event_kind, seq = seq);
}

/// Emit event: gate evaluation completed.
pub fn emit_gate_evaluated(run_id: &str, violations: usize, passed: bool) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        violations = violations,
        passed = passed,
    );
}
