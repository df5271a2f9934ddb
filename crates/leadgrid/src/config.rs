//! Runtime configuration for the enrichment subsystem.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for the enrichment progress subsystem and the listing cache.
///
/// Loaded from a JSON file when present; every field has a sensible default
/// so a missing file is not an error for callers that use [`Default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichmentConfig {
    /// Upper bound on job-item rows read by a single snapshot load.
    pub snapshot_limit: usize,
    /// Capacity of the broadcast channels used for store and job signals.
    pub event_channel_capacity: usize,
    /// Freshness bound for the prospect listing cache, in seconds.
    pub listing_ttl_secs: u64,
    /// Delay between a confirmed stop and the listing refresh signal, in
    /// milliseconds. Lets server-side row statuses settle before re-query.
    pub stop_refresh_delay_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            snapshot_limit: 5000,
            event_channel_capacity: 256,
            listing_ttl_secs: 10,
            stop_refresh_delay_ms: 1000,
        }
    }
}

impl EnrichmentConfig {
    /// Loads the config from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::load_from_str(&content)
    }

    /// Parses the config from a JSON string.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_limit == 0 {
            return Err(ConfigError::Validation {
                message: "snapshotLimit must be greater than 0".to_string(),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "eventChannelCapacity must be greater than 0".to_string(),
            });
        }
        if self.listing_ttl_secs == 0 {
            return Err(ConfigError::Validation {
                message: "listingTtlSecs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Listing cache time-to-live as a [`Duration`].
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }

    /// Post-stop listing refresh delay as a [`Duration`].
    pub fn stop_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.stop_refresh_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EnrichmentConfig::default();
        assert_eq!(config.snapshot_limit, 5000);
        assert_eq!(config.listing_ttl(), Duration::from_secs(10));
        assert_eq!(config.stop_refresh_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_from_str_partial() {
        let config = EnrichmentConfig::load_from_str(r#"{"snapshotLimit": 200}"#).unwrap();
        assert_eq!(config.snapshot_limit, 200);
        // Unspecified fields fall back to defaults
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("leadgrid.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"listingTtlSecs": 5, "stopRefreshDelayMs": 250}}"#).unwrap();

        let config = EnrichmentConfig::load(&path).unwrap();
        assert_eq!(config.listing_ttl(), Duration::from_secs(5));
        assert_eq!(config.stop_refresh_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EnrichmentConfig::load("/nonexistent/leadgrid.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_limit() {
        let err = EnrichmentConfig::load_from_str(r#"{"snapshotLimit": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = EnrichmentConfig::load_from_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }
}
