//! Tracing subscriber and optional OTLP span export.
//!
//! # Telemetry invariants
//!
//! - **No passwords, keys or plaintext** in any span attribute or log field.
//!   Only sizes, suite labels, counts and error categories are recorded.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init_telemetry;
