//! Contract tests for RunLedger.
//!
//! Every test runs against both the in-memory fake and the filesystem
//! ledger; any conforming implementation must pass these.

use chrono::Utc;
use serde_json::json;
use shipwright_state::fakes::MemoryRunLedger;
use shipwright_state::storage_traits::*;
use shipwright_state::{FsRunLedger, StorageError};

fn metadata(name: &str) -> RunMetadata {
    RunMetadata {
        git_sha: Some("abc123".to_string()),
        workflow_name: name.to_string(),
        tags: json!({ "trigger": "push" }),
    }
}

fn event(seq: u64, kind: &str) -> RunEvent {
    RunEvent {
        seq,
        kind: kind.to_string(),
        payload: json!({ "step_name": "package" }),
        timestamp: Utc::now(),
    }
}

fn summary(success: bool) -> RunSummary {
    RunSummary {
        total_events: 2,
        duration_ms: 42,
        success,
    }
}

async fn create_run_starts_running(ledger: &dyn RunLedger) {
    let digest = ContentDigest::from_bytes(b"spec-a");
    let run_id = ledger.create_run(&digest, metadata("deploy")).await.unwrap();

    let record = ledger.get_run(&run_id).await.unwrap();
    assert_eq!(record.status, RunStatus::Running);
    assert_eq!(record.metadata.workflow_name, "deploy");
    assert!(record.summary.is_none());
    assert!(record.completed_at.is_none());
}

async fn events_come_back_ordered(ledger: &dyn RunLedger) {
    let digest = ContentDigest::from_bytes(b"spec-b");
    let run_id = ledger.create_run(&digest, metadata("deploy")).await.unwrap();

    ledger.append_event(&run_id, event(2, "step_succeeded")).await.unwrap();
    ledger.append_event(&run_id, event(1, "step_started")).await.unwrap();

    let events = ledger.get_events(&run_id).await.unwrap();
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
}

async fn terminal_run_rejects_events(ledger: &dyn RunLedger) {
    let digest = ContentDigest::from_bytes(b"spec-c");
    let run_id = ledger.create_run(&digest, metadata("deploy")).await.unwrap();
    ledger.complete_run(&run_id, summary(true)).await.unwrap();

    let err = ledger
        .append_event(&run_id, event(1, "step_started"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));

    let err = ledger.fail_run(&run_id, summary(false)).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));
}

async fn fail_and_cancel_are_terminal(ledger: &dyn RunLedger) {
    let digest = ContentDigest::from_bytes(b"spec-d");

    let failed = ledger.create_run(&digest, metadata("deploy")).await.unwrap();
    ledger.fail_run(&failed, summary(false)).await.unwrap();
    let record = ledger.get_run(&failed).await.unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert!(!record.summary.unwrap().success);

    let cancelled = ledger.create_run(&digest, metadata("deploy")).await.unwrap();
    ledger.cancel_run(&cancelled, summary(false)).await.unwrap();
    assert_eq!(
        ledger.get_run(&cancelled).await.unwrap().status,
        RunStatus::Cancelled
    );
}

async fn unknown_run_not_found(ledger: &dyn RunLedger) {
    let bogus = RunId::new();
    assert!(matches!(
        ledger.get_run(&bogus).await.unwrap_err(),
        StorageError::RunNotFound { .. }
    ));
    assert!(matches!(
        ledger.get_events(&bogus).await.unwrap_err(),
        StorageError::RunNotFound { .. }
    ));
    assert!(matches!(
        ledger.complete_run(&bogus, summary(true)).await.unwrap_err(),
        StorageError::RunNotFound { .. }
    ));
}

async fn list_runs_filters_by_digest(ledger: &dyn RunLedger) {
    let a = ContentDigest::from_bytes(b"list-a");
    let b = ContentDigest::from_bytes(b"list-b");
    ledger.create_run(&a, metadata("one")).await.unwrap();
    ledger.create_run(&a, metadata("two")).await.unwrap();
    ledger.create_run(&b, metadata("three")).await.unwrap();

    assert_eq!(ledger.list_runs(Some(&a)).await.unwrap().len(), 2);
    assert_eq!(ledger.list_runs(Some(&b)).await.unwrap().len(), 1);
    assert!(ledger.list_runs(None).await.unwrap().len() >= 3);
}

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let ledger = MemoryRunLedger::new();
                    super::$name(&ledger).await;
                }
            )*
        }

        mod filesystem {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let dir = tempfile::tempdir().unwrap();
                    let ledger = FsRunLedger::open(dir.path()).unwrap();
                    super::$name(&ledger).await;
                }
            )*
        }
    };
}

contract_tests!(
    create_run_starts_running,
    events_come_back_ordered,
    terminal_run_rejects_events,
    fail_and_cancel_are_terminal,
    unknown_run_not_found,
    list_runs_filters_by_digest,
);
