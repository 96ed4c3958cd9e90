//! Tracing subscriber setup for binaries.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` controls the filter;
/// absent or invalid, it falls back to `info`. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
