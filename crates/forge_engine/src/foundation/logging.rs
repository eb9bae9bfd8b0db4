//! Logging setup.
//!
//! The engine logs through the `log` facade; applications pick the sink.
//! These helpers wire up `env_logger` for the common case.

pub use log::{debug, error, info, trace, warn};

/// Initialize logging from the `RUST_LOG` environment variable.
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a fallback filter used when `RUST_LOG` is unset.
///
/// Useful for demo binaries that should be chatty out of the box:
/// `init_with_default("info")`.
pub fn init_with_default(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}
