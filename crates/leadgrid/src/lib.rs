pub mod config;
pub mod enrich;
pub mod error;
pub mod listing;
pub mod telemetry;

pub use config::EnrichmentConfig;
pub use enrich::{
    summarize, ByteStream, ChangeFeed, ChangeFeedIngester, EnrichmentService, EnrichmentStream,
    FeedSubscription, ItemStatus, ItemUpdate, JobController, JobItemRow, JobItemStore, JobReader,
    JobRow, JobRowSink, JobSignal, JobState, JobStatus, JobSummary, ProgressRecord,
    ProgressSummary, RowChange, Snapshot, SnapshotLoader, StopSummary, StoreEvent, StreamEvent,
    StreamIngester,
};
pub use error::{
    ChangeFeedError, ConfigError, JobControlError, LeadgridError, Result, SnapshotError,
};
pub use listing::{ListingCache, ListingKey, MutationSignal, ProspectStatus};
