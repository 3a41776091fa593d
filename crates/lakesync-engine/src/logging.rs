//! Structured logging setup for embedding processes.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for the sync engine.
///
/// Honors the `RUST_LOG` env var when set, otherwise uses `default_level`
/// (e.g. `"info"` or `"lakesync_engine=debug"`).
///
/// # Panics
///
/// Panics if a global subscriber is already installed; embedders that set
/// up their own subscriber should skip this helper.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// Like [`init`] but tolerates an already-installed subscriber.
/// Intended for test binaries where several tests race to initialize.
pub fn try_init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
