//! Bulk enrichment job tracking.
//!
//! Two independent channels report progress for the same items: the
//! invocation stream (low latency, best effort) and the change feed over
//! persisted rows (authoritative, unordered). Both write into the
//! [`JobItemStore`] through one idempotent merge function, which is what
//! lets them disagree, duplicate, or arrive partially without corrupting
//! the rendered state.

pub mod controller;
pub mod feed;
pub mod presenter;
pub mod snapshot;
pub mod store;
pub mod stream;
pub mod types;

pub use controller::{EnrichmentService, EnrichmentStream, JobController, JobSignal, JobState};
pub use feed::{ChangeFeed, ChangeFeedIngester, FeedSubscription, JobRowSink, RowChange};
pub use presenter::{summarize, ProgressSummary};
pub use snapshot::{JobReader, Snapshot, SnapshotLoader};
pub use store::{JobItemStore, StoreEvent};
pub use stream::{ByteStream, LineFramer, StreamIngester, StreamOutcome};
pub use types::{
    ItemStatus, ItemUpdate, JobItemRow, JobRow, JobStatus, JobSummary, ProgressRecord,
    StopSummary, StreamEvent,
};
