//! Process-wide tracing setup shared by binaries.
//!
//! Logs are structured (JSON by default), filtered by `RUST_LOG` (default
//! `info`) and written to stderr.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init};
