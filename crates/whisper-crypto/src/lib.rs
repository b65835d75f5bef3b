//! Whisper cryptography.
//!
//! - [`keys`]: deterministic Ed25519 -> X25519 key conversion
//! - [`sealed_box`]: X25519 + XSalsa20-Poly1305 authenticated public-key encryption
//! - [`utils`]: constant-time comparisons

#![forbid(unsafe_code)]

pub mod keys;
pub mod sealed_box;
pub mod utils;

#[cfg(test)]
mod proptests;

pub use keys::{derive, derive_public, ConversionError, EncryptionKeypair};
pub use sealed_box::{generate_nonce, open, seal, AuthenticationError, CryptoBoxError, NONCE_LEN, TAG_LEN};
