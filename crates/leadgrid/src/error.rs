use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadgridError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job control error: {0}")]
    JobControl(#[from] JobControlError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Change feed error: {0}")]
    ChangeFeed(#[from] ChangeFeedError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum JobControlError {
    #[error("No prospects selected")]
    EmptySelection,

    #[error("Cannot {action} while job is {state}")]
    InvalidState {
        action: &'static str,
        state: String,
    },

    #[error("No active job")]
    NoActiveJob,

    #[error("Enrichment start rejected: {0}")]
    StartRejected(String),

    #[error("Enrichment stop rejected: {0}")]
    StopRejected(String),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot read failed: {0}")]
    Read(String),

    #[error("Job '{0}' not found")]
    JobNotFound(String),
}

#[derive(Error, Debug)]
pub enum ChangeFeedError {
    #[error("Change feed subscription failed: {0}")]
    Subscribe(String),

    #[error("Change feed closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LeadgridError>;
