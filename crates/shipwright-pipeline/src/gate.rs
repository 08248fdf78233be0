//! Pipeline gate evaluation for pass/fail criteria.

use serde::{Deserialize, Serialize};
use shipwright_state::RunEvent;
use std::collections::BTreeSet;

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,

    /// Steps skipped after a failure (informational).
    pub skipped: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Pipeline gate evaluation rules.
pub struct PipelineGate;

impl PipelineGate {
    /// Evaluate a recorded run.
    ///
    /// Gate rule:
    /// - Every `step_started` must be followed by `step_succeeded` or `step_failed`
    /// - Any `step_failed`, or `step_succeeded` with non-zero exit code, fails the gate
    /// - `step_skipped` is listed but is not itself a violation
    pub fn evaluate(events: &[RunEvent]) -> GateVerdict {
        let mut violations = Vec::new();
        let mut skipped = Vec::new();

        let mut started = BTreeSet::new();
        let mut finished = BTreeSet::new();

        for event in events {
            let step_name = event.payload["step_name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string();

            match event.kind.as_str() {
                "step_started" => {
                    started.insert(step_name);
                }
                "step_succeeded" => {
                    let exit_code = event.payload["exit_code"].as_i64().unwrap_or(-1);
                    if exit_code != 0 {
                        violations.push(format!(
                            "Step '{}' reported success with exit code {}",
                            step_name, exit_code
                        ));
                    }
                    finished.insert(step_name);
                }
                "step_failed" => {
                    let error = event.payload["error"]
                        .as_str()
                        .unwrap_or("Unknown error")
                        .to_string();
                    violations.push(format!("Step '{}' failed: {}", step_name, error));
                    finished.insert(step_name);
                }
                "step_skipped" => skipped.push(step_name),
                _ => {}
            }
        }

        for step in started.difference(&finished) {
            violations.push(format!("Step '{}' was started but never completed", step));
        }

        let passed = violations.is_empty();
        let message = if passed {
            "All steps passed".to_string()
        } else {
            format!("Gate failed with {} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            skipped,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(seq: u64, kind: &str, payload: serde_json::Value) -> RunEvent {
        RunEvent {
            seq,
            kind: kind.to_string(),
            payload,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_events_passes() {
        let verdict = PipelineGate::evaluate(&[]);
        assert!(verdict.passed);
    }

    #[test]
    fn test_single_successful_step() {
        let events = vec![
            event(1, "step_started", json!({ "step_name": "package" })),
            event(
                2,
                "step_succeeded",
                json!({ "step_name": "package", "exit_code": 0 }),
            ),
        ];

        let verdict = PipelineGate::evaluate(&events);
        assert!(verdict.passed);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_failed_step_with_skips_and_cleanup() {
        let events = vec![
            event(1, "step_started", json!({ "step_name": "deploy" })),
            event(
                2,
                "step_failed",
                json!({ "step_name": "deploy", "exit_code": 1, "error": "boom" }),
            ),
            event(3, "step_skipped", json!({ "step_name": "generate_docs" })),
            event(4, "step_started", json!({ "step_name": "logout" })),
            event(
                5,
                "step_succeeded",
                json!({ "step_name": "logout", "exit_code": 0 }),
            ),
        ];

        let verdict = PipelineGate::evaluate(&events);
        assert!(!verdict.passed);
        assert_eq!(verdict.violations.len(), 1);
        assert!(verdict.violations[0].contains("boom"));
        assert_eq!(verdict.skipped, vec!["generate_docs".to_string()]);
    }

    #[test]
    fn test_step_started_but_never_completed() {
        let events = vec![event(1, "step_started", json!({ "step_name": "deploy" }))];

        let verdict = PipelineGate::evaluate(&events);
        assert!(!verdict.passed);
        assert_eq!(verdict.violations.len(), 1);
        assert!(verdict.violations[0].contains("never completed"));
    }

    #[test]
    fn test_success_with_non_zero_exit_code() {
        let events = vec![
            event(1, "step_started", json!({ "step_name": "install" })),
            event(
                2,
                "step_succeeded",
                json!({ "step_name": "install", "exit_code": 127 }),
            ),
        ];

        let verdict = PipelineGate::evaluate(&events);
        assert!(!verdict.passed);
        assert!(verdict.violations[0].contains("127"));
    }
}
