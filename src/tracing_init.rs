//! Tracing initialization for tests
//!
//! Centralized subscriber setup with environment-based filtering, shared
//! by every test that wants log output. The library itself only emits
//! `tracing` events; an embedding binary installs its own subscriber.

use once_cell::sync::Lazy;

/// Initialize tracing for tests with environment-based filtering
///
/// Uses RUST_LOG environment variable to control output:
/// - `RUST_LOG=apidictor=debug` - Show all debug output
/// - `RUST_LOG=apidictor::despike=trace` - Trace specific module
/// - `RUST_LOG=apidictor=debug,apidictor::batch=trace` - Mixed levels
///
/// Call this once at the start of each test that needs tracing.
/// Multiple calls are safe (uses once_cell).
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        // Try to read RUST_LOG, fall back to "apidictor=warn" if not set
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("apidictor=warn"));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_test_writer()
            .init();
    });

    // Force initialization
    Lazy::force(&TRACING);
}
