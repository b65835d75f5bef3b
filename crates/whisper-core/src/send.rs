//! Outgoing messages: seal, encode, submit, record.
//!
//! A send is never retried automatically. A failed submission surfaces
//! [`SendError::SubmissionFailed`] and writes nothing to the store.

use std::sync::Arc;

use tracing::{debug, info};

use whisper_crypto::keys::{derive_public, ConversionError};
use whisper_crypto::sealed_box::{generate_nonce, seal, CryptoBoxError, TAG_LEN};

use crate::envelope::{self, DecodeError, Envelope, PREFIX_LEN};
use crate::keys::Identity;
use crate::ledger::{LedgerError, LedgerSubmit};
use crate::store::{Store, StoreError};
use crate::transaction::MAX_PAYLOAD_LEN;
use crate::types::{Address, AddressError, Direction, MessageRecord, TxSignature};

/// Longest plaintext, in bytes, whose envelope fits in one transaction.
pub const MAX_PLAINTEXT_LEN: usize = (MAX_PAYLOAD_LEN - PREFIX_LEN) / 4 * 3 - TAG_LEN;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(#[from] AddressError),

    #[error("recipient key cannot be used for encryption: {0}")]
    UnsupportedKey(ConversionError),

    #[error("local identity cannot be used for encryption: {0}")]
    LocalKey(ConversionError),

    #[error("message too long: envelope is {len} bytes, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("encryption failed: {0}")]
    Encryption(#[from] CryptoBoxError),

    #[error("envelope failed self-check: {0}")]
    Encoding(#[from] DecodeError),

    #[error("submission failed: {0}")]
    SubmissionFailed(#[from] LedgerError),

    /// The transaction landed but the local record could not be written.
    #[error("message {signature} was sent but could not be recorded: {source}")]
    Persist {
        signature: TxSignature,
        #[source]
        source: StoreError,
    },
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub signature: TxSignature,
    pub record: MessageRecord,
}

/// Seal `plaintext` from `sender` to `recipient` and encode the wire envelope.
///
/// The envelope is decoded again before it is returned; a mismatch is an
/// [`SendError::Encoding`] error. Envelopes over the transaction payload limit
/// fail with [`SendError::MessageTooLong`].
pub fn compose_envelope(
    sender: &Identity,
    recipient: &Address,
    plaintext: &str,
) -> Result<Vec<u8>, SendError> {
    let recipient_x = derive_public(recipient.as_bytes()).map_err(SendError::UnsupportedKey)?;
    let local = sender.encryption_keypair().map_err(SendError::LocalKey)?;

    let expected_len = envelope::encoded_len_for_plaintext(plaintext.len());
    if expected_len > MAX_PAYLOAD_LEN {
        return Err(SendError::MessageTooLong {
            len: expected_len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let nonce = generate_nonce()?;
    let ciphertext = seal(plaintext.as_bytes(), &nonce, &recipient_x, local.secret())?;

    let envelope = Envelope::new(recipient.to_bytes(), nonce, ciphertext);
    let payload = envelope.encode();

    if envelope::decode(&payload)? != envelope {
        return Err(SendError::Encoding(DecodeError::InvalidEncoding {
            field: envelope::Field::Ciphertext,
        }));
    }

    Ok(payload)
}

/// Sends encrypted messages through a ledger and records them locally.
pub struct SendFlow<L: LedgerSubmit + ?Sized, S: Store + ?Sized> {
    ledger: Arc<L>,
    store: Arc<S>,
    program: Address,
}

impl<L: LedgerSubmit + ?Sized, S: Store + ?Sized> SendFlow<L, S> {
    pub fn new(ledger: Arc<L>, store: Arc<S>, program: Address) -> Self {
        Self {
            ledger,
            store,
            program,
        }
    }

    pub fn program(&self) -> &Address {
        &self.program
    }

    /// Encrypt `plaintext` for `recipient_address` and submit it.
    ///
    /// # Arguments
    /// * `identity` - Local identity; signs and pays for the transaction
    /// * `recipient_address` - Recipient's base58 ledger address
    /// * `plaintext` - Message text
    ///
    /// # Returns
    /// * `Ok(SendReceipt)` once the transaction is confirmed and recorded
    /// * `Err(SendError)` otherwise; see the variants for which steps ran
    pub async fn send(
        &self,
        identity: &Identity,
        recipient_address: &str,
        plaintext: &str,
    ) -> Result<SendReceipt, SendError> {
        let recipient: Address = recipient_address.parse()?;
        let payload = compose_envelope(identity, &recipient, plaintext)?;

        debug!(
            recipient = %recipient,
            payload_len = payload.len(),
            "submitting envelope"
        );

        let signature = self
            .ledger
            .submit(identity.signing_key(), &self.program, &payload)
            .await?;

        info!(signature = %signature, recipient = %recipient, "message sent");

        let record = MessageRecord {
            signature: signature.clone(),
            local_address: identity.address(),
            counterparty: recipient,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            text: plaintext.to_string(),
            direction: Direction::Outgoing,
        };

        self.store
            .insert_message(record.clone())
            .await
            .map_err(|source| SendError::Persist {
                signature: signature.clone(),
                source,
            })?;

        Ok(SendReceipt { signature, record })
    }
}
