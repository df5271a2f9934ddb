//! Job lifecycle: start, cooperative stop, derived completion.

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::EnrichmentConfig;
use crate::enrich::feed::{ChangeFeed, ChangeFeedIngester, FeedSubscription, JobRowSink};
use crate::enrich::presenter::{summarize, ProgressSummary};
use crate::enrich::snapshot::SnapshotLoader;
use crate::enrich::store::{JobItemStore, StoreEvent};
use crate::enrich::stream::{ByteStream, StreamIngester};
use crate::enrich::types::{JobRow, JobStatus, JobSummary, ProgressRecord, StopSummary};
use crate::error::{JobControlError, LeadgridError};

/// Client-side lifecycle state of the enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl JobState {
    /// States from which a new start attempt is allowed.
    fn can_start(&self) -> bool {
        matches!(self, JobState::Idle | JobState::Failed)
    }

    /// States that end the completion watcher.
    fn is_settled(&self) -> bool {
        matches!(self, JobState::Stopped | JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Starting => write!(f, "starting"),
            JobState::Running => write!(f, "running"),
            JobState::Stopping => write!(f, "stopping"),
            JobState::Stopped => write!(f, "stopped"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Handle returned by the batch-invocation endpoint.
pub struct EnrichmentStream {
    pub job_id: String,
    pub total_count: u32,
    pub body: ByteStream,
}

/// The external batch-processing collaborator.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Launches a bulk run and returns its streaming response.
    async fn start(&self, prospect_ids: &[String]) -> Result<EnrichmentStream, JobControlError>;

    /// Requests a cooperative stop. Already-enriched items are preserved;
    /// in-flight and unstarted items move to the downstream review
    /// disposition. The returned counts are authoritative.
    async fn stop(&self, job_id: &str) -> Result<StopSummary, JobControlError>;
}

/// Signals emitted for the hosting UI.
#[derive(Debug, Clone)]
pub enum JobSignal {
    StateChanged(JobState),
    /// The invocation stream ended, with whatever it reported last.
    StreamFinished {
        saw_complete: bool,
        summary: Option<JobSummary>,
    },
    /// Emitted a short delay after a confirmed stop, once server-side row
    /// statuses have had time to settle.
    RefreshListing,
}

struct ControllerInner {
    state: JobState,
    job_id: Option<String>,
    total_count: u32,
}

/// Owns job identity and the lifecycle state machine.
///
/// The controller never assumes success optimistically: `stop` transitions
/// to `Stopped` only on the stop call's confirmed response, and completion
/// is derived from the store rather than commanded by either channel.
pub struct JobController {
    service: Arc<dyn EnrichmentService>,
    store: Arc<JobItemStore>,
    inner: RwLock<ControllerInner>,
    signals: broadcast::Sender<JobSignal>,
    stop_refresh_delay: Duration,
}

impl JobController {
    pub fn new(
        service: Arc<dyn EnrichmentService>,
        store: Arc<JobItemStore>,
        config: &EnrichmentConfig,
    ) -> Self {
        let (signals, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            service,
            store,
            inner: RwLock::new(ControllerInner {
                state: JobState::Idle,
                job_id: None,
                total_count: 0,
            }),
            signals,
            stop_refresh_delay: config.stop_refresh_delay(),
        }
    }

    /// Subscribes to controller signals.
    pub fn subscribe(&self) -> broadcast::Receiver<JobSignal> {
        self.signals.subscribe()
    }

    pub fn state(&self) -> JobState {
        self.read_inner().state
    }

    pub fn job_id(&self) -> Option<String> {
        self.read_inner().job_id.clone()
    }

    /// Expected item count for the active job.
    pub fn total_count(&self) -> u32 {
        self.read_inner().total_count
    }

    pub fn store(&self) -> &Arc<JobItemStore> {
        &self.store
    }

    /// Current aggregate progress.
    pub fn progress(&self) -> ProgressSummary {
        summarize(&self.store.snapshot())
    }

    /// Starts a bulk run for the selected prospects.
    ///
    /// On success the invocation stream is ingested in a background task and
    /// the returned job id can be used to wire the change feed. On rejection
    /// the state moves to `Failed` and no partial state is created; a new
    /// start attempt is allowed from there.
    pub async fn start(
        self: Arc<Self>,
        prospect_ids: Vec<String>,
    ) -> Result<String, JobControlError> {
        if prospect_ids.is_empty() {
            return Err(JobControlError::EmptySelection);
        }
        self.transition(JobState::Starting, |state| state.can_start(), "start")?;

        let attempt_id = Uuid::new_v4();
        log::info!(
            "Starting enrichment for {} prospects (attempt {})",
            prospect_ids.len(),
            attempt_id
        );

        let stream = match self.service.start(&prospect_ids).await {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Enrichment start rejected (attempt {}): {}", attempt_id, e);
                self.set_state(JobState::Failed);
                return Err(e);
            }
        };

        let job_id = stream.job_id.clone();
        {
            let mut inner = self.write_inner();
            inner.job_id = Some(job_id.clone());
            inner.total_count = stream.total_count.max(prospect_ids.len() as u32);
        }
        // Every selected prospect renders as pending until a channel says
        // otherwise, so items the run never reaches still show up.
        self.store.seed(
            prospect_ids
                .iter()
                .map(|id| ProgressRecord::pending(id, ""))
                .collect(),
        );
        self.set_state(JobState::Running);

        self.clone().spawn_stream_ingestion(stream.body);
        self.clone().spawn_completion_watcher();

        Ok(job_id)
    }

    /// Re-attaches to an existing job after a reload or reconnect.
    ///
    /// Sequencing matters: the snapshot is seeded first, the feed is
    /// subscribed only after it resolves, so a stale bulk read can never
    /// overwrite newer live data. Dropping the returned subscription guard
    /// detaches the client; the job itself keeps running server-side.
    pub async fn attach(
        self: Arc<Self>,
        job_id: &str,
        loader: &SnapshotLoader,
        feed: &dyn ChangeFeed,
    ) -> Result<FeedSubscription, LeadgridError> {
        self.transition(JobState::Starting, |state| state.can_start(), "attach")
            .map_err(LeadgridError::JobControl)?;

        {
            let mut inner = self.write_inner();
            inner.job_id = Some(job_id.to_string());
        }

        let snapshot = match loader.load(job_id, &self.store).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Retryable: the user reopens the dialog and we attach again.
                self.set_state(JobState::Idle);
                return Err(e.into());
            }
        };

        {
            let mut inner = self.write_inner();
            inner.total_count = snapshot.job.total_count;
        }
        self.set_state(match snapshot.job.status {
            JobStatus::Running => JobState::Running,
            JobStatus::Stopped => JobState::Stopped,
            JobStatus::Completed => JobState::Completed,
        });

        let ingester = ChangeFeedIngester::new(Arc::clone(&self.store), self.clone() as Arc<dyn JobRowSink>);
        let subscription = ingester.start(feed, job_id)?;

        if self.state() == JobState::Running {
            self.clone().spawn_completion_watcher();
            // The job may already be done, with the rows ahead of the job row.
            self.maybe_complete();
        }

        Ok(subscription)
    }

    /// Requests a cooperative stop of the running job.
    ///
    /// Irreversible; callers gate this behind an explicit confirmation
    /// prompt. Per-item records keep whatever status they had when the
    /// server processed the stop: only the job-level state changes.
    pub async fn stop(&self) -> Result<StopSummary, JobControlError> {
        self.transition(
            JobState::Stopping,
            |state| *state == JobState::Running,
            "stop",
        )?;
        let job_id = match self.job_id() {
            Some(id) => id,
            None => {
                self.set_state(JobState::Running);
                return Err(JobControlError::NoActiveJob);
            }
        };

        match self.service.stop(&job_id).await {
            Ok(summary) => {
                log::info!(
                    "Job {} stopped: {} enriched, {} no contacts, {} failed, {} moved to review",
                    job_id,
                    summary.enriched,
                    summary.no_contacts,
                    summary.failed,
                    summary.stopped
                );
                self.set_state(JobState::Stopped);
                self.schedule_listing_refresh();
                Ok(summary)
            }
            Err(e) => {
                // Revert so the user can retry; the job is still running.
                log::warn!("Stop request for job {} rejected: {}", job_id, e);
                self.set_state(JobState::Running);
                Err(e)
            }
        }
    }

    /// Transitions `Running → Completed` once every expected item is
    /// terminal. Derived, not commanded: neither channel needs to deliver an
    /// explicit "done" signal for the job to finish.
    pub fn maybe_complete(&self) {
        // Item statuses are monotonic, so a summary taken before the lock
        // can only under-report completion, never fabricate it.
        let summary = self.progress();
        {
            let mut inner = self.write_inner();
            if inner.state != JobState::Running || !summary.is_complete(inner.total_count) {
                return;
            }
            // Check and set under one lock: a concurrent stop must not see
            // Running here and then have Completed slip in behind it.
            log::info!("All {} items terminal, job complete", inner.total_count);
            inner.state = JobState::Completed;
        }
        let _ = self
            .signals
            .send(JobSignal::StateChanged(JobState::Completed));
    }

    fn spawn_stream_ingestion(self: Arc<Self>, body: ByteStream) {
        let ingester = StreamIngester::new(Arc::clone(&self.store));
        tokio::spawn(async move {
            let outcome = ingester.run(body).await;
            let _ = self.signals.send(JobSignal::StreamFinished {
                saw_complete: outcome.saw_complete,
                summary: outcome.summary,
            });
            self.maybe_complete();
        });
    }

    /// Watches store notifications and re-derives completion after each one.
    ///
    /// The task also listens to its own state signals: a stop settles the
    /// job without any store event, and the watcher must wind down then
    /// rather than stay parked holding the controller alive.
    fn spawn_completion_watcher(self: Arc<Self>) {
        let mut store_rx = self.store.subscribe();
        let mut signal_rx = self.signals.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = store_rx.recv() => match event {
                        Ok(StoreEvent::Updated(_)) | Ok(StoreEvent::Seeded { .. }) => {
                            self.maybe_complete();
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("Completion watcher lagged, missed {} store events", n);
                            self.maybe_complete();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    signal = signal_rx.recv() => match signal {
                        Ok(JobSignal::StateChanged(state)) if state.is_settled() => break,
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
                if self.state().is_settled() {
                    break;
                }
            }
        });
    }

    /// Full listing refresh after a stop, delayed so server-side statuses
    /// settle before the list re-queries.
    fn schedule_listing_refresh(&self) {
        let signals = self.signals.clone();
        let delay = self.stop_refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(JobSignal::RefreshListing);
        });
    }

    fn transition(
        &self,
        to: JobState,
        allowed: impl Fn(&JobState) -> bool,
        action: &'static str,
    ) -> Result<(), JobControlError> {
        let mut inner = self.write_inner();
        if !allowed(&inner.state) {
            return Err(JobControlError::InvalidState {
                action,
                state: inner.state.to_string(),
            });
        }
        log::info!("Job state: {} -> {} ({})", inner.state, to, action);
        inner.state = to;
        drop(inner);
        let _ = self.signals.send(JobSignal::StateChanged(to));
        Ok(())
    }

    fn set_state(&self, to: JobState) {
        {
            let mut inner = self.write_inner();
            if inner.state == to {
                return;
            }
            log::info!("Job state: {} -> {}", inner.state, to);
            inner.state = to;
        }
        let _ = self.signals.send(JobSignal::StateChanged(to));
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, ControllerInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job controller lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, ControllerInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job controller lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobRowSink for JobController {
    /// Applies an authoritative job row observed on the change feed.
    /// Terminal statuses are sticky; a `running` row never moves the local
    /// state machine, which is owned by start/stop/completion.
    fn apply_job_row(&self, row: &JobRow) {
        {
            let mut inner = self.write_inner();
            if row.total_count > 0 {
                inner.total_count = row.total_count;
            }
        }
        let state = self.state();
        if state.is_settled() {
            return;
        }
        match row.status {
            JobStatus::Stopped => self.set_state(JobState::Stopped),
            JobStatus::Completed => self.set_state(JobState::Completed),
            JobStatus::Running => {}
        }
    }
}
