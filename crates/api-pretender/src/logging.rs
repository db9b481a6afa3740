//! Log setup for test binaries.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber that writes through the test harness' capture.
///
/// Honours `RUST_LOG`, defaulting to `info`. Calling it more than once is a
/// no-op.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
