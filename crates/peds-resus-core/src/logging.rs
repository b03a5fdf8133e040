//! Logging setup.
//!
//! Library code only emits `tracing` events; the host decides whether to
//! install a subscriber. Initialization is idempotent so a host shell may call
//! it on every launch.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize logging at INFO, overridable with RUST_LOG.
pub fn init() -> bool {
    init_with_level("info")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default log level (trace, debug, info, warn, error)
///
/// This can still be overridden by the RUST_LOG environment variable.
/// Returns false when a subscriber was already installed.
pub fn init_with_level(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init()
        .is_ok()
}

/// Initialize logging at the level from the config file.
pub fn init_from_config(config: &LoggingConfig) -> bool {
    init_with_level(&config.level)
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
