//! Change-feed subscription against the persisted job and job-item rows.
//!
//! The feed delivers row-level update events with the new row payload and
//! guarantees neither ordering nor completeness; correctness relies on the
//! store's merge rule, and missed events are covered by re-running the
//! snapshot on re-attach.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::enrich::store::JobItemStore;
use crate::enrich::types::{ItemUpdate, JobItemRow, JobRow};
use crate::error::ChangeFeedError;

/// A row-level change from one of the two logical tables.
#[derive(Debug, Clone)]
pub enum RowChange {
    Item(JobItemRow),
    Job(JobRow),
}

/// Subscription source for row changes, filtered by job id.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, job_id: &str) -> Result<broadcast::Receiver<RowChange>, ChangeFeedError>;
}

/// Receives authoritative job-row updates observed on the feed.
pub trait JobRowSink: Send + Sync {
    fn apply_job_row(&self, row: &JobRow);
}

/// Guard over a running feed subscription task.
///
/// Dropping the guard aborts the task: re-attaching without stopping the
/// previous subscription would otherwise deliver duplicates forever. The
/// job itself is unaffected; it lives server-side.
pub struct FeedSubscription {
    handle: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    /// Stops delivery. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Returns true while the subscription task is still running.
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Translates feed deliveries into store applies and job-row updates.
pub struct ChangeFeedIngester {
    store: Arc<JobItemStore>,
    sink: Arc<dyn JobRowSink>,
}

impl ChangeFeedIngester {
    pub fn new(store: Arc<JobItemStore>, sink: Arc<dyn JobRowSink>) -> Self {
        Self { store, sink }
    }

    /// Subscribes on the feed and spawns the delivery loop.
    pub fn start(
        &self,
        feed: &dyn ChangeFeed,
        job_id: &str,
    ) -> Result<FeedSubscription, ChangeFeedError> {
        let mut rx = feed.subscribe(job_id)?;
        let store = Arc::clone(&self.store);
        let sink = Arc::clone(&self.sink);
        let job_id = job_id.to_string();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RowChange::Item(row)) => {
                        if row.job_id != job_id {
                            continue;
                        }
                        store.apply(ItemUpdate::from(&row));
                    }
                    Ok(RowChange::Job(row)) => {
                        if row.job_id != job_id {
                            continue;
                        }
                        sink.apply_job_row(&row);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Tolerated: replays are idempotent and the snapshot
                        // covers anything dropped here.
                        log::warn!("Change feed lagged for job {}, missed {} events", job_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::info!("Change feed closed for job {}", job_id);
                        break;
                    }
                }
            }
        });

        Ok(FeedSubscription {
            handle: Some(handle),
        })
    }
}
