//! Local blob cache for network resources.
//!
//! [`store::ChunkStore`] persists payloads under paths derived from their content
//! identifier, at most once per identifier. [`crypto::decrypt_with_fallback`]
//! turns a stored ciphertext container into plaintext, reading both container
//! generations written by historical signers, and [`archive::uncompress`]
//! unpacks the result.

pub mod archive;
pub mod crypto;
mod error;
pub mod store;

pub use crate::error::{Error, Result};
