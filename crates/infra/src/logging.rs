//! Logging initialisation
//!
//! Structured tracing only; no `println!` in runtime code. The filter is
//! taken from `RUST_LOG` when set, otherwise from the provided default.

use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber at `info` level.
pub fn init() {
    init_with_filter("info");
}

/// Initialise the global subscriber with a custom default filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
