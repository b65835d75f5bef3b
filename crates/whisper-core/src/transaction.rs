//! Minimal legacy Solana transaction encoding for single-instruction messages.
//!
//! The transaction has one signer (the fee payer), two account keys
//! `[payer, program]`, and one instruction that carries the envelope as its
//! data with no account inputs.

use ed25519_dalek::{Signer, SigningKey};

use crate::types::{Address, TxSignature};

/// Maximum serialized transaction size accepted by the network.
pub const PACKET_DATA_SIZE: usize = 1232;

/// Bytes of a serialized transaction that are not instruction data, assuming
/// the data length fits a two-byte shortvec.
pub const TRANSACTION_OVERHEAD: usize = 1 // signature count
    + 64 // signature
    + 3 // message header
    + 1 // account key count
    + 32 * 2 // payer, program
    + 32 // recent blockhash
    + 1 // instruction count
    + 1 // program id index
    + 1 // account index count
    + 2; // data length

/// Largest instruction payload that still fits in one packet.
pub const MAX_PAYLOAD_LEN: usize = PACKET_DATA_SIZE - TRANSACTION_OVERHEAD;

/// Append `value` in compact-u16 ("shortvec") form.
pub fn encode_shortvec(out: &mut Vec<u8>, value: u16) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Serialize the message part that the fee payer signs.
pub fn build_message(payer: &Address, program: &Address, recent_blockhash: &[u8; 32], data: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(TRANSACTION_OVERHEAD - 65 + data.len());

    // Header: 1 required signature, 0 readonly signed, 1 readonly unsigned (the program)
    msg.extend_from_slice(&[1, 0, 1]);

    encode_shortvec(&mut msg, 2);
    msg.extend_from_slice(payer.as_bytes());
    msg.extend_from_slice(program.as_bytes());

    msg.extend_from_slice(recent_blockhash);

    encode_shortvec(&mut msg, 1);
    msg.push(1); // program id index
    encode_shortvec(&mut msg, 0);
    // Data length is bounded by MAX_PAYLOAD_LEN, far below u16::MAX.
    encode_shortvec(&mut msg, data.len() as u16);
    msg.extend_from_slice(data);

    msg
}

/// A signed, serialized transaction ready for `sendTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub signature: TxSignature,
    pub wire: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Build and sign a single-instruction transaction carrying `data` for `program`.
pub fn build_signed(
    signer: &SigningKey,
    program: &Address,
    recent_blockhash: &[u8; 32],
    data: &[u8],
) -> Result<SignedTransaction, TransactionError> {
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(TransactionError::PayloadTooLarge {
            len: data.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let payer = Address::new(signer.verifying_key().to_bytes());
    let message = build_message(&payer, program, recent_blockhash, data);
    let sig = signer.sign(&message).to_bytes();

    let mut wire = Vec::with_capacity(1 + 64 + message.len());
    encode_shortvec(&mut wire, 1);
    wire.extend_from_slice(&sig);
    wire.extend_from_slice(&message);

    Ok(SignedTransaction {
        signature: TxSignature::from_bytes(&sig),
        wire,
    })
}
