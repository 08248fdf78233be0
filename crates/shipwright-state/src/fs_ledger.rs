//! Filesystem-backed run ledger.
//!
//! Layout: `<root>/runs/<run_id>/record.json` plus an append-only
//! `<root>/runs/<run_id>/events.jsonl`. Record rewrites go through a temp
//! file in the same directory and a rename, so a crashed process never
//! leaves a half-written record behind.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage_traits::*;

const RECORD_FILE: &str = "record.json";
const EVENTS_FILE: &str = "events.jsonl";

/// Run ledger persisted as plain JSON files under a root directory.
pub struct FsRunLedger {
    runs_dir: PathBuf,
    // serialises read-modify-write of record.json within this process
    write_lock: Mutex<()>,
}

impl FsRunLedger {
    /// Open (or create) a ledger rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let runs_dir = root.as_ref().join("runs");
        fs::create_dir_all(&runs_dir)?;
        Ok(Self {
            runs_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn run_dir(&self, run_id: &RunId) -> StorageResult<PathBuf> {
        // ids are joined onto the ledger root, so only accept UUIDs
        if uuid::Uuid::parse_str(&run_id.0).is_err() {
            return Err(StorageError::InvalidRunId {
                run_id: run_id.0.clone(),
            });
        }
        Ok(self.runs_dir.join(&run_id.0))
    }

    fn read_record(&self, run_id: &RunId) -> StorageResult<RunRecord> {
        let path = self.run_dir(run_id)?.join(RECORD_FILE);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::RunNotFound {
                    run_id: run_id.0.clone(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_record(&self, record: &RunRecord) -> StorageResult<()> {
        let dir = self.run_dir(&record.run_id)?;
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(record)?)?;
        tmp.persist(dir.join(RECORD_FILE)).map_err(|e| e.error)?;
        Ok(())
    }

    fn finish(&self, run_id: &RunId, status: RunStatus, summary: RunSummary) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut record = self.read_record(run_id)?;
        record.finish(status, summary)?;
        self.write_record(&record)?;
        debug!(run_id = %run_id, status = %record.status, "run finalized");
        Ok(())
    }
}

#[async_trait]
impl RunLedger for FsRunLedger {
    async fn create_run(
        &self,
        spec_digest: &ContentDigest,
        metadata: RunMetadata,
    ) -> StorageResult<RunId> {
        let run_id = RunId::new();
        let record = RunRecord::started(run_id.clone(), spec_digest.clone(), metadata);
        let _guard = self.write_lock.lock().unwrap();
        self.write_record(&record)?;
        Ok(run_id)
    }

    async fn append_event(&self, run_id: &RunId, event: RunEvent) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        self.read_record(run_id)?.ensure_running()?;

        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir(run_id)?.join(EVENTS_FILE))?;
        file.write_all(&line)?;
        Ok(())
    }

    async fn complete_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()> {
        self.finish(run_id, RunStatus::Completed, summary)
    }

    async fn fail_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()> {
        self.finish(run_id, RunStatus::Failed, summary)
    }

    async fn cancel_run(&self, run_id: &RunId, summary: RunSummary) -> StorageResult<()> {
        self.finish(run_id, RunStatus::Cancelled, summary)
    }

    async fn get_run(&self, run_id: &RunId) -> StorageResult<RunRecord> {
        self.read_record(run_id)
    }

    async fn get_events(&self, run_id: &RunId) -> StorageResult<Vec<RunEvent>> {
        // existence check so unknown runs report RunNotFound, not an empty list
        self.read_record(run_id)?;

        let path = self.run_dir(run_id)?.join(EVENTS_FILE);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str::<RunEvent>(&line)?);
        }
        events.sort_by_key(|e| e.seq);
        Ok(events)
    }

    async fn list_runs(
        &self,
        spec_digest: Option<&ContentDigest>,
    ) -> StorageResult<Vec<RunRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.runs_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let run_id = RunId(entry.file_name().to_string_lossy().into_owned());
            match self.read_record(&run_id) {
                Ok(record) => {
                    if spec_digest.map(|d| record.spec_digest == *d).unwrap_or(true) {
                        records.push(record);
                    }
                }
                Err(e) => warn!(run_id = %run_id, error = %e, "skipping unreadable run"),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
