//! Crypto engine: key derivation, the password envelope, the suite registry
//! and the asymmetric schemes.
//!
//! Nothing in this module logs. Callers decide what is safe to record; the
//! engine only ever sees secrets.

pub mod asymmetric;
pub mod context;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod logistic;
pub mod padding;
pub mod primitives;
pub mod registry;
pub mod rng;

pub use context::{CipherContext, KeyMaterial};
pub use error::CryptoError;
pub use kdf::{Kdf, KdfDefaults};
pub use registry::{CipherRegistry, CipherSuite};
pub use rng::{OsRandom, RandomSource};
