//! Shared fakes and builders for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::broadcast;

use leadgrid::{
    ChangeFeed, ChangeFeedError, EnrichmentService, EnrichmentStream, ItemStatus, JobControlError,
    JobItemRow, JobReader, JobRow, JobStatus, RowChange, SnapshotError, StopSummary,
};

pub fn job_row(job_id: &str, status: JobStatus, total: u32, processed: u32) -> JobRow {
    JobRow {
        job_id: job_id.to_string(),
        status,
        total_count: total,
        processed_count: processed,
        started_at: Utc::now(),
        completed_at: if status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        },
    }
}

pub fn item_row(job_id: &str, item_id: &str, status: ItemStatus) -> JobItemRow {
    JobItemRow {
        item_id: item_id.to_string(),
        job_id: job_id.to_string(),
        domain: format!("{item_id}.example.com"),
        status,
        contacts_found: None,
        has_emails: None,
        error_message: None,
        updated_at: Utc::now(),
    }
}

pub fn success_row(job_id: &str, item_id: &str, contacts: u32) -> JobItemRow {
    JobItemRow {
        contacts_found: Some(contacts),
        has_emails: Some(contacts > 0),
        ..item_row(job_id, item_id, ItemStatus::Success)
    }
}

/// In-memory stand-in for the managed backend: batch invocation, graceful
/// stop, snapshot reads and the change feed, all against shared state.
pub struct FakeBackend {
    pub job_id: String,
    pub jobs: Mutex<HashMap<String, JobRow>>,
    pub items: Mutex<Vec<JobItemRow>>,
    /// Lines the invocation stream will emit, one frame per line.
    pub stream_lines: Mutex<Vec<String>>,
    pub stop_summary: StopSummary,
    pub feed_tx: broadcast::Sender<RowChange>,
    /// Snapshot reads that fail before the first success, for retry tests.
    pub snapshot_failures: AtomicUsize,
}

impl FakeBackend {
    pub fn new(job_id: &str) -> Self {
        let (feed_tx, _) = broadcast::channel(128);
        Self {
            job_id: job_id.to_string(),
            jobs: Mutex::new(HashMap::new()),
            items: Mutex::new(Vec::new()),
            stream_lines: Mutex::new(Vec::new()),
            stop_summary: StopSummary {
                enriched: 0,
                no_contacts: 0,
                failed: 0,
                stopped: 0,
            },
            feed_tx,
            snapshot_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_job(self, row: JobRow) -> Self {
        self.jobs.lock().unwrap().insert(row.job_id.clone(), row);
        self
    }

    pub fn with_items(self, rows: Vec<JobItemRow>) -> Self {
        *self.items.lock().unwrap() = rows;
        self
    }

    pub fn with_stream_lines(self, lines: &[&str]) -> Self {
        *self.stream_lines.lock().unwrap() = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_stop_summary(mut self, summary: StopSummary) -> Self {
        self.stop_summary = summary;
        self
    }

    pub fn with_snapshot_failures(self, n: usize) -> Self {
        self.snapshot_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Pushes a row change as the change feed would deliver it.
    pub fn emit_item(&self, row: JobItemRow) {
        let _ = self.feed_tx.send(RowChange::Item(row));
    }

    pub fn emit_job(&self, row: JobRow) {
        let _ = self.feed_tx.send(RowChange::Job(row));
    }
}

#[async_trait]
impl EnrichmentService for FakeBackend {
    async fn start(&self, prospect_ids: &[String]) -> Result<EnrichmentStream, JobControlError> {
        let lines = self.stream_lines.lock().unwrap().clone();
        let chunks: Vec<std::io::Result<Vec<u8>>> = lines
            .into_iter()
            .map(|l| Ok(format!("{l}\n").into_bytes()))
            .collect();
        Ok(EnrichmentStream {
            job_id: self.job_id.clone(),
            total_count: prospect_ids.len() as u32,
            body: futures_util::stream::iter(chunks).boxed(),
        })
    }

    async fn stop(&self, _job_id: &str) -> Result<StopSummary, JobControlError> {
        Ok(self.stop_summary)
    }
}

impl ChangeFeed for FakeBackend {
    fn subscribe(&self, _job_id: &str) -> Result<broadcast::Receiver<RowChange>, ChangeFeedError> {
        Ok(self.feed_tx.subscribe())
    }
}

#[async_trait]
impl JobReader for FakeBackend {
    async fn job(&self, job_id: &str) -> Result<Option<JobRow>, SnapshotError> {
        if self
            .snapshot_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SnapshotError::Read("transient backend error".to_string()));
        }
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }

    async fn items(&self, job_id: &str, limit: usize) -> Result<Vec<JobItemRow>, SnapshotError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.job_id == job_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
