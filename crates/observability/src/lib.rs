//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize tracing for the process, reading `RUST_LOG` and `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env());
}
