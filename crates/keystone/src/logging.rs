//! # Logging
//!
//! Installs a `tracing` subscriber. `RUST_LOG` wins over the configured
//! filter when set.

use keystone_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed; calling this more
/// than once is harmless.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
