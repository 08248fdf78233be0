//! Run recording: bridges step lifecycle events to `RunLedger` persistence.

use std::sync::Arc;

use chrono::Utc;
use shipwright_state::{
    ContentDigest, RunEvent, RunId, RunLedger, RunMetadata, RunSummary, StorageResult,
};

/// Step lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Started,
    Succeeded,
    Failed,
    Skipped,
}

impl StepEvent {
    /// The `kind` string stored in the ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            StepEvent::Started => "step_started",
            StepEvent::Succeeded => "step_succeeded",
            StepEvent::Failed => "step_failed",
            StepEvent::Skipped => "step_skipped",
        }
    }
}

/// Records step events for one run into a [`RunLedger`].
///
/// Usage:
/// 1. Call [`RunRecorder::start`] to create a new run.
/// 2. Call [`RunRecorder::record`] for each step event.
/// 3. Call [`RunRecorder::finish_ok`] or [`RunRecorder::finish_err`] to finalize.
pub struct RunRecorder {
    ledger: Arc<dyn RunLedger>,
    run_id: RunId,
    next_seq: u64,
}

impl RunRecorder {
    /// Start a new run in the ledger, returning a recorder bound to that run.
    pub async fn start(
        ledger: Arc<dyn RunLedger>,
        spec_digest: &ContentDigest,
        metadata: RunMetadata,
    ) -> StorageResult<Self> {
        let run_id = ledger.create_run(spec_digest, metadata.clone()).await?;
        crate::obs::emit_run_started(run_id.to_string().as_str(), &metadata.workflow_name);
        Ok(Self {
            ledger,
            run_id,
            next_seq: 1,
        })
    }

    /// Record a step event. `payload` must be a JSON object; `step_name` is
    /// added to it.
    pub async fn record(
        &mut self,
        event: StepEvent,
        step_name: &str,
        mut payload: serde_json::Value,
    ) -> StorageResult<()> {
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(
                "step_name".to_string(),
                serde_json::Value::String(step_name.to_string()),
            );
        }
        let seq = self.next_seq;
        let run_event = RunEvent {
            seq,
            kind: event.kind().to_string(),
            payload,
            timestamp: Utc::now(),
        };
        crate::obs::emit_event_appended(&self.run_id.to_string(), event.kind(), seq);
        self.ledger.append_event(&self.run_id, run_event).await?;
        self.next_seq += 1;
        Ok(())
    }

    /// Number of events recorded so far.
    pub fn events_recorded(&self) -> u64 {
        self.next_seq - 1
    }

    /// Finalize the run as completed.
    pub async fn finish_ok(self, summary: RunSummary) -> StorageResult<()> {
        crate::obs::emit_run_finished(
            &self.run_id.to_string(),
            summary.duration_ms,
            summary.total_events,
            true,
        );
        self.ledger.complete_run(&self.run_id, summary).await
    }

    /// Finalize the run as failed.
    pub async fn finish_err(self, summary: RunSummary) -> StorageResult<()> {
        crate::obs::emit_run_finished(
            &self.run_id.to_string(),
            summary.duration_ms,
            summary.total_events,
            false,
        );
        self.ledger.fail_run(&self.run_id, summary).await
    }

    /// Return a reference to the run ID.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}
