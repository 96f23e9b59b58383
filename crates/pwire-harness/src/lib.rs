#![forbid(unsafe_code)]

//! Page fixtures for pwire tests.
//!
//! [`PageFixture`] parses markup into a fresh window and registry;
//! [`CallLog`] records which named handlers fired and with what.
//! [`init_test_logging`] routes `tracing` output through the test writer,
//! filtered by `PWIRE_LOG`.

pub mod call_log;
pub mod fixture;

pub use call_log::CallLog;
pub use fixture::PageFixture;

use pwire_core::logging::LOG_FILTER_ENV;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per process. Later calls are no-ops.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
