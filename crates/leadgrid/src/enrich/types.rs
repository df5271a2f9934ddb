//! Core types for enrichment jobs and per-prospect progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a bulk enrichment job.
///
/// `Stopped` and `Completed` are terminal and sticky: once observed, no
/// channel may move the job back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Stopped,
    Completed,
}

impl JobStatus {
    /// Returns true if this status will not change further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Stopped | JobStatus::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Stopped => write!(f, "stopped"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Status of a single job item (one prospect).
///
/// Per item the status is monotonic: pending → processing → one of
/// (success, failed, rate_limited). No transition moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Success,
    Failed,
    RateLimited,
}

impl ItemStatus {
    /// Returns true for success, failed and rate_limited.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Success | ItemStatus::Failed | ItemStatus::RateLimited
        )
    }

    /// Merge rank. A status only ever moves to a strictly higher rank, which
    /// makes the store's merge idempotent and order-tolerant: a terminal
    /// status wins over any non-terminal one regardless of arrival order,
    /// and the first terminal status to land is frozen.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Processing => 1,
            ItemStatus::Success | ItemStatus::Failed | ItemStatus::RateLimited => 2,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Processing => write!(f, "processing"),
            ItemStatus::Success => write!(f, "success"),
            ItemStatus::Failed => write!(f, "failed"),
            ItemStatus::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// Persisted job row as read from the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRow {
    pub job_id: String,
    pub status: JobStatus,
    pub total_count: u32,
    pub processed_count: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persisted job-item row as read from the backing store or delivered by
/// the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItemRow {
    pub item_id: String,
    pub job_id: String,
    pub domain: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts_found: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_emails: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Merged client-side view of one item's progress. Not persisted; this is
/// what the dialog renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub item_id: String,
    pub domain: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts_found: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_emails: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    /// Creates a fresh pending record.
    pub fn pending(item_id: &str, domain: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            domain: domain.to_string(),
            status: ItemStatus::Pending,
            contacts_found: None,
            has_emails: None,
            error: None,
        }
    }
}

impl From<JobItemRow> for ProgressRecord {
    fn from(row: JobItemRow) -> Self {
        Self {
            item_id: row.item_id,
            domain: row.domain,
            status: row.status,
            contacts_found: row.contacts_found,
            has_emails: row.has_emails,
            error: row.error_message,
        }
    }
}

/// Partial update against a single progress record. Absent fields leave the
/// existing record untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub item_id: String,
    pub domain: Option<String>,
    pub status: Option<ItemStatus>,
    pub contacts_found: Option<u32>,
    pub has_emails: Option<bool>,
    pub error: Option<String>,
}

impl ItemUpdate {
    /// A bare status change for one item.
    pub fn status(item_id: &str, status: ItemStatus) -> Self {
        Self {
            item_id: item_id.to_string(),
            status: Some(status),
            ..Default::default()
        }
    }
}

impl From<&JobItemRow> for ItemUpdate {
    fn from(row: &JobItemRow) -> Self {
        Self {
            item_id: row.item_id.clone(),
            domain: Some(row.domain.clone()),
            status: Some(row.status),
            contacts_found: row.contacts_found,
            has_emails: row.has_emails,
            error: row.error_message.clone(),
        }
    }
}

/// Counts returned by the graceful-stop endpoint, for the confirmation toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSummary {
    pub enriched: u32,
    pub no_contacts: u32,
    pub failed: u32,
    pub stopped: u32,
}

/// Job-level summary carried by the stream's `complete` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// One framed record on the batch-invocation stream.
///
/// The wire format is newline-delimited `data: <json>` frames with a `type`
/// discriminator and camelCase fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Non-terminal status change: the item moved to processing.
    #[serde(rename_all = "camelCase")]
    Progress {
        prospect_id: String,
        #[serde(default)]
        domain: Option<String>,
    },
    /// Terminal success, with the number of contacts found.
    #[serde(rename_all = "camelCase")]
    Success {
        prospect_id: String,
        #[serde(default)]
        domain: Option<String>,
        #[serde(default)]
        contacts_found: Option<u32>,
        #[serde(default)]
        has_emails: Option<bool>,
    },
    /// Terminal failure, with an error message.
    #[serde(rename_all = "camelCase")]
    Error {
        prospect_id: String,
        #[serde(default)]
        domain: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        rate_limited: bool,
    },
    /// Job-level completion summary. Not a per-item update.
    #[serde(rename_all = "camelCase")]
    Complete {
        #[serde(default)]
        summary: Option<JobSummary>,
    },
}
