//! Ledger collaborators.
//!
//! The ledger is an untrusted transport: it stores opaque payloads and tells
//! us who paid for them and when. These traits keep the scan and send flows
//! independent of the concrete network client.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, TxSignature};

/// Largest page `getSignaturesForAddress` will return.
pub const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Error, Clone)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected response: {0}")]
    BadResponse(String),

    #[error("transaction {0} rejected: {1}")]
    Rejected(TxSignature, String),

    #[error("transaction {0} not confirmed in time")]
    ConfirmationTimeout(TxSignature),

    #[error("cannot build transaction: {0}")]
    InvalidTransaction(String),
}

/// How settled a transaction must be before the ledger reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level: {other}")),
        }
    }
}

/// Bounds for one page of signature history, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePage {
    /// Start strictly older than this signature
    pub before: Option<TxSignature>,
    /// Stop at this signature (exclusive)
    pub until: Option<TxSignature>,
    pub limit: usize,
}

/// The parts of a transaction the protocol needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub signature: TxSignature,
    /// Fee payer, i.e. the first signer
    pub sender: Address,
    /// Instruction data addressed to the protocol program, if any
    pub payload: Option<Vec<u8>>,
    /// Block time in unix seconds, when the ledger reports one
    pub block_time: Option<i64>,
    /// Execution failed on-ledger
    pub failed: bool,
}

/// Read access to the ledger's transaction history.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Signatures of transactions that reference `address`, newest first.
    async fn signatures_for_address(
        &self,
        address: &Address,
        page: &SignaturePage,
    ) -> Result<Vec<TxSignature>, LedgerError>;

    /// Fetch one transaction. `Ok(None)` when the ledger does not know it.
    async fn transaction(
        &self,
        signature: &TxSignature,
    ) -> Result<Option<LedgerTransaction>, LedgerError>;
}

/// Submission of signed transactions.
#[async_trait]
pub trait LedgerSubmit: Send + Sync {
    /// Submit `payload` as instruction data for `program`, signed and paid by
    /// `signer`. Returns once the transaction is confirmed.
    async fn submit(
        &self,
        signer: &SigningKey,
        program: &Address,
        payload: &[u8],
    ) -> Result<TxSignature, LedgerError>;
}
