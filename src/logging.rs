//! Diagnostic logging setup
//!
//! Logs go to stderr so they never mix with command output on stdout.
//! `RUST_LOG`, when set, overrides the configured level.

use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Calling it twice is harmless; the
/// second call leaves the first subscriber in place.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
