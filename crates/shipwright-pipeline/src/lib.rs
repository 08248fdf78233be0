//! Shipwright Pipeline - push-to-main deploy pipeline
//!
//! Provides a linear pipeline orchestrator that:
//! - Executes steps in declared order (install, package, login, deploy, docs)
//! - Skips the remaining regular steps after the first failure
//! - Always runs steps flagged `always_run` (logout, cache purge)
//! - Records every step as events in a run ledger for gate evaluation

pub mod credentials;
pub mod error;
pub mod gate;
pub mod git;
pub mod obs;
pub mod package;
pub mod pipeline;
pub mod recording;
pub mod runner;
pub mod spec;
pub mod stage;
pub mod telemetry;
pub mod workflow;

// Re-export key types
pub use credentials::AzureCredentials;
pub use error::{PipelineError, Result};
pub use gate::{GateVerdict, PipelineGate};
pub use git::capture_head_sha;
pub use package::{package_directory, PackageReport};
pub use pipeline::{Pipeline, PipelineResult};
pub use recording::{RunRecorder, StepEvent};
pub use runner::{StepResult, StepRunner};
pub use spec::PipelineSpec;
pub use stage::{BuiltinStep, StepAction, StepConfig};
pub use telemetry::init_tracing;
pub use workflow::{DeploySettings, Trigger, Workflow};
