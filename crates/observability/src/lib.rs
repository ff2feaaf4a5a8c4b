//! Process-wide logging setup for services embedding the inventory core.

/// Tracing configuration (filters, formatter).
pub mod tracing;

/// Initialize process-wide tracing with the default `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init_with_default("info");
}
