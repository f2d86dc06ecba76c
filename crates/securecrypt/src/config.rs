//! Configuration loading and validation for the SecureCrypt service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::KdfDefaults;
use crate::imaging::DetectParams;

/// Lowest PBKDF2 iteration count accepted as a service default.
pub const MIN_DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`). `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP/gRPC collector endpoint. Spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Default PBKDF2-HMAC-SHA256 iteration count.
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// Default scrypt cost `N`; must be a power of two.
    #[serde(default = "default_scrypt_n")]
    pub scrypt_n: u64,

    /// Default scrypt block size `r`.
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,

    /// Default scrypt parallelism `p`.
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Auto-decrypt detector tile edge in pixels.
    #[serde(default = "default_detect_block_size")]
    pub detect_block_size: u32,

    /// Auto-decrypt detector standard-deviation threshold.
    #[serde(default = "default_detect_threshold")]
    pub detect_stddev_threshold: f64,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}
fn default_pbkdf2_iterations() -> u32 {
    100_000
}
fn default_scrypt_n() -> u64 {
    1 << 14
}
fn default_scrypt_r() -> u32 {
    8
}
fn default_scrypt_p() -> u32 {
    1
}
fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}
fn default_request_timeout() -> u64 {
    30
}
fn default_detect_block_size() -> u32 {
    16
}
fn default_detect_threshold() -> f64 {
    60.0
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.log_level, "LOG_LEVEL")?;
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }

        if self.pbkdf2_iterations < MIN_DEFAULT_PBKDF2_ITERATIONS {
            anyhow::bail!("PBKDF2_ITERATIONS must be >= {MIN_DEFAULT_PBKDF2_ITERATIONS}");
        }
        if self.scrypt_n < 2 || !self.scrypt_n.is_power_of_two() {
            anyhow::bail!("SCRYPT_N must be a power of two >= 2");
        }
        if self.scrypt_r == 0 || self.scrypt_p == 0 {
            anyhow::bail!("SCRYPT_R and SCRYPT_P must be > 0");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.detect_block_size == 0 {
            anyhow::bail!("DETECT_BLOCK_SIZE must be > 0");
        }
        if !(self.detect_stddev_threshold.is_finite() && self.detect_stddev_threshold > 0.0) {
            anyhow::bail!("DETECT_STDDEV_THRESHOLD must be a positive number");
        }
        Ok(())
    }

    /// KDF defaults handed to the crypto engine.
    pub fn kdf_defaults(&self) -> KdfDefaults {
        KdfDefaults {
            pbkdf2_iterations: self.pbkdf2_iterations,
            scrypt_n: self.scrypt_n,
            scrypt_r: self.scrypt_r,
            scrypt_p: self.scrypt_p,
        }
    }

    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            block_size: self.detect_block_size,
            threshold: self.detect_stddev_threshold,
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(())
}
