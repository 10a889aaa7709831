//! Tracing subscriber initialization for binaries and integration tests.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` controls the filter;
/// defaults to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
