//! Wire types, region parsing, and errors shared across `securecrypt` crates.

pub mod error;
pub mod protocol;

pub use error::{ErrorCategory, ServiceError};
