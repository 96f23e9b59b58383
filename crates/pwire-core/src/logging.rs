#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature the usual `tracing` macros are re-exported so
//! downstream crates can log through `pwire_core::{debug, error, ...}`
//! without naming `tracing` themselves. The `tracing-json` feature adds a
//! one-call JSON subscriber for production hosts.

#[cfg(feature = "tracing")]
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Environment variable holding the filter directives (`RUST_LOG` syntax).
pub const LOG_FILTER_ENV: &str = "PWIRE_LOG";

/// Install a global JSON subscriber filtered by [`LOG_FILTER_ENV`]
/// (default `info`). Returns `false` if a subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
        .is_ok()
}

#[cfg(all(test, feature = "tracing-json"))]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_subscriber() {
        let _ = init_json_subscriber();
        assert!(!init_json_subscriber());
    }
}
