//! Canonical prospect statuses for the CRM listing.
//!
//! Legacy names are accepted on input through one explicit alias table and
//! normalized at parse time; display paths only ever see canonical values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a prospect in the listing.
///
/// `Review` is the disposition in-flight items receive when a job is
/// stopped; it is a CRM status, not a job-item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    New,
    Contacted,
    Interested,
    NotInterested,
    Review,
    Customer,
}

/// Legacy names still found in older rows and saved filters.
const LEGACY_ALIASES: &[(&str, ProspectStatus)] = &[
    ("qualified", ProspectStatus::Interested),
    ("in_review", ProspectStatus::Review),
];

impl ProspectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProspectStatus::New => "new",
            ProspectStatus::Contacted => "contacted",
            ProspectStatus::Interested => "interested",
            ProspectStatus::NotInterested => "not_interested",
            ProspectStatus::Review => "review",
            ProspectStatus::Customer => "customer",
        }
    }

    /// Parses a canonical or legacy status name.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let canonical = match normalized.as_str() {
            "new" => Some(ProspectStatus::New),
            "contacted" => Some(ProspectStatus::Contacted),
            "interested" => Some(ProspectStatus::Interested),
            "not_interested" => Some(ProspectStatus::NotInterested),
            "review" => Some(ProspectStatus::Review),
            "customer" => Some(ProspectStatus::Customer),
            _ => None,
        };
        canonical.or_else(|| {
            LEGACY_ALIASES
                .iter()
                .find(|(alias, _)| *alias == normalized)
                .map(|&(_, status)| status)
        })
    }
}

impl std::fmt::Display for ProspectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Unknown prospect status '{0}'")]
pub struct UnknownStatus(String);

impl std::str::FromStr for ProspectStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
