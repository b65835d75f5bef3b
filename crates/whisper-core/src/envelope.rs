//! On-ledger envelope codec.
//!
//! Layout (bit-exact): `b64(recipient[32]) || b64(nonce[24]) || b64(ciphertext)`,
//! standard padded base64 with no separators. The first two fields always
//! encode to 44 and 32 characters, so the ciphertext runs from offset 76 to the
//! end of the buffer.
//!
//! Decoding succeeds for any well-formed envelope regardless of recipient;
//! filtering by recipient happens in the scan engine.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use whisper_crypto::sealed_box::{NONCE_LEN, TAG_LEN};

/// Encoded length of the 32-byte recipient key.
pub const RECIPIENT_FIELD_LEN: usize = 44;
/// Encoded length of the 24-byte nonce.
pub const NONCE_FIELD_LEN: usize = 32;
/// Fixed prefix preceding the ciphertext.
pub const PREFIX_LEN: usize = RECIPIENT_FIELD_LEN + NONCE_FIELD_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Recipient,
    Nonce,
    Ciphertext,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Recipient => "recipient",
            Field::Nonce => "nonce",
            Field::Ciphertext => "ciphertext",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("envelope truncated: {len} bytes, need at least {PREFIX_LEN}")]
    Truncated { len: usize },
    #[error("invalid base64 in {field} field")]
    InvalidEncoding { field: Field },
    #[error("{field} field decodes to {got} bytes, expected {expected}")]
    InvalidLength {
        field: Field,
        expected: usize,
        got: usize,
    },
}

/// A decoded envelope. Produced once per message; immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Recipient's Ed25519 public key (their ledger address).
    pub recipient: [u8; 32],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn new(recipient: [u8; 32], nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self {
            recipient,
            nonce,
            ciphertext,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(&self.recipient, &self.nonce, &self.ciphertext)
    }
}

/// Encode the three fields into the wire payload.
pub fn encode(recipient: &[u8; 32], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut out = String::with_capacity(PREFIX_LEN + base64_len(ciphertext.len()));
    STANDARD.encode_string(recipient, &mut out);
    STANDARD.encode_string(nonce, &mut out);
    STANDARD.encode_string(ciphertext, &mut out);
    out.into_bytes()
}

/// Split a payload at the fixed offsets and decode each field.
pub fn decode(payload: &[u8]) -> Result<Envelope, DecodeError> {
    if payload.len() < PREFIX_LEN {
        return Err(DecodeError::Truncated { len: payload.len() });
    }

    let (recipient_b64, rest) = payload.split_at(RECIPIENT_FIELD_LEN);
    let (nonce_b64, ciphertext_b64) = rest.split_at(NONCE_FIELD_LEN);

    let recipient: [u8; 32] = decode_fixed(recipient_b64, Field::Recipient)?;
    let nonce: [u8; NONCE_LEN] = decode_fixed(nonce_b64, Field::Nonce)?;
    let ciphertext = STANDARD
        .decode(ciphertext_b64)
        .map_err(|_| DecodeError::InvalidEncoding {
            field: Field::Ciphertext,
        })?;

    Ok(Envelope {
        recipient,
        nonce,
        ciphertext,
    })
}

fn decode_fixed<const N: usize>(encoded: &[u8], field: Field) -> Result<[u8; N], DecodeError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| DecodeError::InvalidEncoding { field })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| DecodeError::InvalidLength {
            field,
            expected: N,
            got: bytes.len(),
        })
}

fn base64_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}

/// Wire length of an envelope carrying `plaintext_len` bytes of message text.
pub fn encoded_len_for_plaintext(plaintext_len: usize) -> usize {
    PREFIX_LEN + base64_len(plaintext_len + TAG_LEN)
}
