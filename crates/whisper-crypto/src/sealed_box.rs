//! Public-key authenticated encryption for message bodies.
//! Implements the NaCl `crypto_box` construction: X25519 + HSalsa20 + XSalsa20-Poly1305.
//!
//! The nonce is supplied by the caller and travels next to the ciphertext. It
//! must be fresh for every message sealed under the same key pair; use
//! [`generate_nonce`].

use crypto_box::aead::{generic_array::GenericArray, Aead};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use x25519_dalek::StaticSecret;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 24;
/// Poly1305 tag length in bytes; ciphertexts are `plaintext.len() + TAG_LEN`.
pub const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CryptoBoxError {
    #[error("random source unavailable")]
    Rng,
    #[error("encryption failed")]
    EncryptFailed,
}

/// Ciphertext did not authenticate under the given keys and nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("authentication failed")]
pub struct AuthenticationError;

/// Generate a fresh random nonce from the OS RNG.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoBoxError> {
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(|_| CryptoBoxError::Rng)?;
    Ok(nonce)
}

fn salsa_box(peer_public: &[u8; 32], own_secret: &StaticSecret) -> SalsaBox {
    let peer = PublicKey::from(*peer_public);
    let own = SecretKey::from(own_secret.to_bytes());
    SalsaBox::new(&peer, &own)
}

/// Seal `plaintext` from the sender to the recipient.
pub fn seal(
    plaintext: &[u8],
    nonce: &[u8; NONCE_LEN],
    recipient_public: &[u8; 32],
    sender_secret: &StaticSecret,
) -> Result<Vec<u8>, CryptoBoxError> {
    salsa_box(recipient_public, sender_secret)
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| CryptoBoxError::EncryptFailed)
}

/// Open a ciphertext sealed by `sender_public` for the holder of `recipient_secret`.
///
/// Failure is the expected result for data addressed to another key or
/// corrupted in transit. No partial plaintext is ever returned.
pub fn open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
    sender_public: &[u8; 32],
    recipient_secret: &StaticSecret,
) -> Result<Vec<u8>, AuthenticationError> {
    if ciphertext.len() < TAG_LEN {
        return Err(AuthenticationError);
    }
    salsa_box(sender_public, recipient_secret)
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| AuthenticationError)
}
