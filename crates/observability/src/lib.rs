//! Tracing/logging setup shared by StockDesk binaries.
//!
//! Libraries only emit `tracing` events; installing a subscriber is the
//! binary's job.

/// Initialize process-wide tracing.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use self::tracing::LogFormat;
