//! Bulk snapshot read that seeds the store on (re)attach.
//!
//! A change feed, unlike a log, does not replay missed events. Every attach
//! and every reconnect therefore starts with one bounded bulk read of the
//! current rows before the live channels are wired.

use std::sync::Arc;

use async_trait::async_trait;

use crate::enrich::store::JobItemStore;
use crate::enrich::types::{JobItemRow, JobRow, ProgressRecord};
use crate::error::SnapshotError;

/// Read access to persisted job and job-item rows.
#[async_trait]
pub trait JobReader: Send + Sync {
    async fn job(&self, job_id: &str) -> Result<Option<JobRow>, SnapshotError>;
    async fn items(&self, job_id: &str, limit: usize) -> Result<Vec<JobItemRow>, SnapshotError>;
}

/// Result of a snapshot load.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub job: JobRow,
    pub items_loaded: usize,
}

/// Performs the one-shot bulk read and seeds the store.
pub struct SnapshotLoader {
    reader: Arc<dyn JobReader>,
    limit: usize,
}

impl SnapshotLoader {
    pub fn new(reader: Arc<dyn JobReader>, limit: usize) -> Self {
        Self { reader, limit }
    }

    /// Reads the job row plus up to `limit` item rows and replaces the
    /// store contents. Errors are retryable; the caller surfaces them
    /// without touching the store.
    pub async fn load(
        &self,
        job_id: &str,
        store: &JobItemStore,
    ) -> Result<Snapshot, SnapshotError> {
        let job = self
            .reader
            .job(job_id)
            .await?
            .ok_or_else(|| SnapshotError::JobNotFound(job_id.to_string()))?;

        let rows = self.reader.items(job_id, self.limit).await?;
        let items_loaded = rows.len();
        if items_loaded >= self.limit {
            log::warn!(
                "Snapshot for job {} truncated at {} items",
                job_id,
                self.limit
            );
        }

        store.seed(rows.into_iter().map(ProgressRecord::from).collect());
        log::info!("Seeded {} items for job {}", items_loaded, job_id);

        Ok(Snapshot { job, items_loaded })
    }
}
