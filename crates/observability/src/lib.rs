//! Tracing/logging setup shared by the gateway binaries.

/// Initialize process-wide logging with the format named by `REGAUTH_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, UnknownLogFormat};
