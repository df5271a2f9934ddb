//! Prospect listing concerns adjacent to the job subsystem.

pub mod cache;
pub mod status;

pub use cache::{ListingCache, ListingKey, MutationSignal};
pub use status::{ProspectStatus, UnknownStatus};
