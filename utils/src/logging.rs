//! Structured logging initialization via `tracing`.

use tracing_subscriber::EnvFilter;

/// Install a plain `fmt` subscriber for tools and tests.
///
/// `RUST_LOG` wins over `default_level`. Calling this twice is harmless; the
/// second call leaves the first subscriber in place.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
