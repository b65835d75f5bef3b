//! Key conversion from Ed25519 signing identities to X25519 encryption keys.
//!
//! The secret half follows the usual birational mapping: the X25519 scalar is
//! the clamped lower half of `SHA-512(seed)`, which is the same scalar Ed25519
//! uses for signing. The public half maps the Edwards point to its Montgomery
//! u-coordinate. Both directions agree: converting a signing key yields the
//! same public key as converting its verifying key.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for key conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("signing public key is not a valid curve point")]
    InvalidPoint,
    #[error("signing public key has small order")]
    SmallOrder,
}

/// X25519 keypair derived from an Ed25519 signing key.
///
/// Never persisted; recompute it from the signing key when needed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKeypair {
    #[zeroize(skip)]
    public: [u8; 32],
    #[zeroize(skip)] // StaticSecret zeroizes itself
    secret: StaticSecret,
}

impl EncryptionKeypair {
    /// X25519 public key bytes.
    pub fn public(&self) -> &[u8; 32] {
        &self.public
    }

    /// X25519 static secret, for use with [`crate::sealed_box`].
    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl fmt::Debug for EncryptionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeypair")
            .field("public", &hex_prefix(&self.public))
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn hex_prefix(bytes: &[u8; 32]) -> String {
    bytes[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Derive the encryption keypair for a signing key.
///
/// Pure and deterministic. Fails only if the signing key's own public half
/// does not convert, which cannot happen for keys produced by `ed25519-dalek`
/// but is still checked rather than assumed.
pub fn derive(signing_key: &SigningKey) -> Result<EncryptionKeypair, ConversionError> {
    let public = derive_public(&signing_key.verifying_key().to_bytes())?;

    let mut hash: [u8; 64] = Sha512::digest(signing_key.to_bytes()).into();
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&hash[..32]);
    hash.zeroize();

    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;

    let secret = StaticSecret::from(scalar);
    scalar.zeroize();

    debug_assert_eq!(X25519PublicKey::from(&secret).to_bytes(), public);

    Ok(EncryptionKeypair { public, secret })
}

/// Convert a counterparty's Ed25519 public key to its X25519 public key.
///
/// Rejects encodings that do not decompress to a curve point and points of
/// small order; either would yield a key nobody holds the secret for.
pub fn derive_public(signing_public: &[u8; 32]) -> Result<[u8; 32], ConversionError> {
    let verifying_key =
        VerifyingKey::from_bytes(signing_public).map_err(|_| ConversionError::InvalidPoint)?;
    if verifying_key.is_weak() {
        return Err(ConversionError::SmallOrder);
    }
    Ok(verifying_key.to_montgomery().to_bytes())
}
