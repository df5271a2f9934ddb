//! Logging initialization for host applications.
//!
//! Library code logs through the `log` facade; hosts call [`init_logging`]
//! once at startup to route everything through a tracing subscriber.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber with an env-filter, falling back to
/// `default_filter` when `RUST_LOG` is unset. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    // Bridge `log` macros into tracing before the subscriber installs.
    let _ = tracing_log::LogTracer::init();

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    if result.is_ok() {
        tracing::debug!("Logging initialized");
    }
}
