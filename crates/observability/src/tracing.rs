//! Tracing/logging initialization.
//!
//! Services log structured fields (`item_id`, `quantity`, `transaction_number`)
//! so JSON output is the default.

use tracing_subscriber::EnvFilter;

/// Install a JSON subscriber filtered by `RUST_LOG`, falling back to `default_directive`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_with_default(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        ::tracing::debug!(default_directive, "tracing initialised");
    }
    installed
}
