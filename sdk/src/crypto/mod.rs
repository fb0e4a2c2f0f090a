//! Decryption of ciphertext containers produced by historical signers.
//!
//! A container is a file laid out as:
//!
//! - IV (128 bits)
//! - AES-256 ciphertext of the payload, PKCS#7 padded
//!
//! Two signer generations wrote containers with different block modes and
//! nothing in the file records which one was used:
//!
//! - current signers use CBC with the stored IV;
//! - legacy signers use ECB. The first 16 bytes are still present and are
//!   skipped, but they never act as an IV.
//!
//! [`decrypt_with_fallback`] therefore tries CBC first and ECB second. A CBC
//! attempt on an ECB container almost always ends in a padding error on the
//! final block, which is what triggers the second attempt.

mod cipher;
mod io;

pub use {
    cipher::{StreamDecryptor, encrypt_container},
    io::{DECRYPTED_FILE_NAME, decrypt_file, decrypt_with_fallback, encrypt_file},
};

use derive_more::Display;

/// Length of the IV prefix of every container.
pub const IV_LENGTH: usize = 16;

/// Length of an AES block.
pub const BLOCK_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Algorithm {
    /// AES-256-CBC with PKCS#7 padding.
    #[display("AES/CBC/PKCS5Padding")]
    Cbc,
    /// AES-256-ECB with PKCS#7 padding, written by legacy signers.
    #[display("AES")]
    Ecb,
}
