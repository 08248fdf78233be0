//! Shipwright-State: run ledger persistence for pipeline runs
//!
//! Every pipeline execution is recorded as a run: a record with metadata
//! and terminal status, plus an ordered stream of step events. The gate
//! and the `history` command read runs back from the ledger.
//!
//! ## Key Components
//!
//! - `RunLedger`: backend-agnostic async trait
//! - `MemoryRunLedger`: in-memory fake for tests
//! - `FsRunLedger`: one directory per run on the local filesystem

mod error;
pub mod fakes;
pub mod fs_ledger;
pub mod storage_traits;

pub use error::StorageError;
pub use fs_ledger::FsRunLedger;
pub use storage_traits::{
    ContentDigest, RunEvent, RunId, RunLedger, RunMetadata, RunRecord, RunStatus, RunSummary,
    StorageResult,
};
