use tracing_subscriber::{fmt, EnvFilter};

/// Install the global log subscriber
///
/// The level is read from `RUST_LOG` (for example `RUST_LOG=marker_dosage=debug`) and defaults
/// to `info`. Logs go to stderr so they never mix with command output.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Verbose logging captured by the test harness
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
