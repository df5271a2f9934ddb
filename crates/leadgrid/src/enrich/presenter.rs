//! Pure derivation of summary counters from the store contents.

use serde::Serialize;

use crate::enrich::types::{ItemStatus, ProgressRecord};

/// Aggregate counters rendered by the progress dialog.
///
/// "Succeeded, no contacts" is deliberately separate from both "succeeded
/// with contacts" and "failed": a clean run that found nothing is actionable
/// differently than a hard failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total: u32,
    pub pending: u32,
    pub processing: u32,
    pub succeeded_with_contacts: u32,
    pub succeeded_no_contacts: u32,
    pub failed: u32,
    pub rate_limited: u32,
    pub percent_complete: u8,
}

impl ProgressSummary {
    /// Items that reached a terminal status.
    pub fn completed_count(&self) -> u32 {
        self.succeeded_with_contacts + self.succeeded_no_contacts + self.failed + self.rate_limited
    }

    /// True once every expected item is terminal.
    pub fn is_complete(&self, expected_total: u32) -> bool {
        expected_total > 0 && self.completed_count() >= expected_total
    }
}

/// Summarizes a set of progress records.
///
/// Percent complete is the share of terminal items; since item statuses are
/// monotonic and records are never removed, it is non-decreasing across any
/// sequence of applies over a fixed item set.
pub fn summarize(records: &[ProgressRecord]) -> ProgressSummary {
    let mut summary = ProgressSummary {
        total: records.len() as u32,
        ..Default::default()
    };

    for record in records {
        match record.status {
            ItemStatus::Pending => summary.pending += 1,
            ItemStatus::Processing => summary.processing += 1,
            ItemStatus::Success => {
                let with_contacts = record.contacts_found.unwrap_or(0) > 0
                    || record.has_emails.unwrap_or(false);
                if with_contacts {
                    summary.succeeded_with_contacts += 1;
                } else {
                    summary.succeeded_no_contacts += 1;
                }
            }
            ItemStatus::Failed => summary.failed += 1,
            ItemStatus::RateLimited => summary.rate_limited += 1,
        }
    }

    if summary.total > 0 {
        summary.percent_complete = (summary.completed_count() * 100 / summary.total) as u8;
    }
    summary
}
