use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::OsRng;

use whisper_crypto::keys::{derive, ConversionError, EncryptionKeypair};

use crate::types::Address;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("keypair must be 64 bytes, got {0}")]
    InvalidLength(usize),
    #[error("public half of keypair does not match its secret seed")]
    PublicKeyMismatch,
}

/// The local signing identity: pays for and signs ledger transactions.
///
/// Loaded once at startup. The matching encryption keys are derived on demand
/// with [`Identity::encryption_keypair`] and never stored alongside it.
#[derive(Clone)]
pub struct Identity {
    signing: SigningKey,
}

impl Identity {
    /// Generate a fresh identity. (Key-file persistence wraps this.)
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_signing_key(signing: SigningKey) -> Self {
        Self { signing }
    }

    /// Load from the 64-byte `seed || public` keypair layout.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let arr: &[u8; 64] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;
        let signing =
            SigningKey::from_keypair_bytes(arr).map_err(|_| IdentityError::PublicKeyMismatch)?;
        Ok(Self { signing })
    }

    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing.to_keypair_bytes()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn address(&self) -> Address {
        Address::new(self.signing.verifying_key().to_bytes())
    }

    pub fn encryption_keypair(&self) -> Result<EncryptionKeypair, ConversionError> {
        derive(&self.signing)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("address", &self.address()).finish()
    }
}
