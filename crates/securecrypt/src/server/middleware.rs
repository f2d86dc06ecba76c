//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, body limits, CORS and
//! response compression.

use std::time::Duration;

use crate::config::Config;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default largest accepted request body. Images travel as Base64 inside
/// JSON, so this is well above the largest expected upload.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Request limits enforced by the router layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Limits {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}
