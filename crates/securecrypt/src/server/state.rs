//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::crypto::{CipherRegistry, KdfDefaults, OsRandom, RandomSource};
use crate::imaging::DetectParams;

use super::middleware::Limits;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or `Copy`) so that Axum
/// can clone the state for each request without copying the suite table.
#[derive(Clone)]
pub struct AppState {
    /// Immutable table of every supported `(algorithm, mode)` suite.
    pub registry: Arc<CipherRegistry>,
    /// Source of salts, IVs, nonces and generated keys.
    pub rng: Arc<dyn RandomSource>,
    /// KDF parameters used when a request names none.
    pub kdf_defaults: KdfDefaults,
    /// Auto-decrypt detector defaults.
    pub detect: DetectParams,
    /// Body size and timeout limits.
    pub limits: Limits,
}

impl AppState {
    /// Create a new [`AppState`] from its parts.
    pub fn new(
        registry: CipherRegistry,
        rng: Arc<dyn RandomSource>,
        kdf_defaults: KdfDefaults,
        detect: DetectParams,
        limits: Limits,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            rng,
            kdf_defaults,
            detect,
            limits,
        }
    }

    /// Production state: builtin suites, OS randomness, configured defaults.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            CipherRegistry::builtin(),
            Arc::new(OsRandom),
            cfg.kdf_defaults(),
            cfg.detect_params(),
            Limits::from_config(cfg),
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("suites", &self.registry.len())
            .field("kdf_defaults", &self.kdf_defaults)
            .field("detect", &self.detect)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Default for AppState {
    /// Creates a default [`AppState`] with built-in defaults, suitable for tests.
    fn default() -> Self {
        Self::new(
            CipherRegistry::builtin(),
            Arc::new(OsRandom),
            KdfDefaults::default(),
            DetectParams::default(),
            Limits::default(),
        )
    }
}
