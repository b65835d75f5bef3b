use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A 32-byte ledger account address (an Ed25519 public key), shown in base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is not valid base58")]
    InvalidBase58,
    #[error("address must decode to 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Unique identifier of a ledger transaction (base58 of its first signature).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxSignature(String);

impl TxSignature {
    pub fn new(signature: impl Into<String>) -> Self {
        Self(signature.into())
    }

    pub fn from_bytes(signature: &[u8; 64]) -> Self {
        Self(bs58::encode(signature).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// One message, sent or received, keyed by the transaction that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub signature: TxSignature,
    /// Our own address at the time the record was created
    pub local_address: Address,
    /// Sender for incoming messages, recipient for outgoing ones
    pub counterparty: Address,
    pub timestamp_ms: i64,
    pub text: String,
    pub direction: Direction,
}

/// Newest transaction signature already inspected by a scan pass.
///
/// `None` means nothing has been scanned yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCheckpoint {
    pub last_seen_signature: Option<TxSignature>,
}

impl ScanCheckpoint {
    pub fn at(signature: TxSignature) -> Self {
        Self {
            last_seen_signature: Some(signature),
        }
    }
}
