//! Test harness: an in-memory ledger with real paging semantics.
//!
//! `InMemoryLedger` implements both ledger collaborators. Submitted
//! transactions are built and signed exactly as they would be for the
//! network, so signatures are genuine. Failure switches let tests exercise
//! the abort paths of the send and scan flows.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use tokio::sync::RwLock;

use crate::ledger::{LedgerError, LedgerQuery, LedgerSubmit, LedgerTransaction, SignaturePage};
use crate::transaction::{build_signed, TransactionError};
use crate::types::{Address, TxSignature};

/// Block time of the first transaction; each later one is a second newer.
pub const GENESIS_BLOCK_TIME: i64 = 1_700_000_000;

struct Entry {
    program: Address,
    tx: LedgerTransaction,
}

/// In-memory ledger. Transactions are kept oldest first.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<Vec<Entry>>,
    broken_fetches: RwLock<HashSet<TxSignature>>,
    fail_queries: AtomicBool,
    reject_submissions: AtomicBool,
    signature_queries: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every signature listing fail with a transport error.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every submission fail as rejected.
    pub fn set_reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    /// Make fetching this one transaction fail with a transport error.
    pub async fn fail_fetch(&self, signature: TxSignature) {
        self.broken_fetches.write().await.insert(signature);
    }

    /// Number of `signatures_for_address` calls served so far.
    pub async fn signature_queries(&self) -> usize {
        self.signature_queries.load(Ordering::SeqCst)
    }

    pub async fn transaction_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn block_time_of(&self, signature: &TxSignature) -> Option<i64> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| &e.tx.signature == signature)
            .and_then(|e| e.tx.block_time)
    }

    /// Append a successful transaction carrying `payload` for `program`.
    pub async fn push_payload(&self, program: Address, sender: Address, payload: Vec<u8>) -> TxSignature {
        self.push(program, sender, Some(payload), false).await
    }

    /// Append a transaction whose execution failed.
    pub async fn push_failed(&self, program: Address, sender: Address, payload: Vec<u8>) -> TxSignature {
        self.push(program, sender, Some(payload), true).await
    }

    /// Append a transaction that references `program` without instruction data for it.
    pub async fn push_without_payload(&self, program: Address, sender: Address) -> TxSignature {
        self.push(program, sender, None, false).await
    }

    async fn push(
        &self,
        program: Address,
        sender: Address,
        payload: Option<Vec<u8>>,
        failed: bool,
    ) -> TxSignature {
        let mut entries = self.entries.write().await;
        let seq = entries.len() as u64;
        let signature = synthetic_signature(seq);
        entries.push(Entry {
            program,
            tx: LedgerTransaction {
                signature: signature.clone(),
                sender,
                payload,
                block_time: Some(GENESIS_BLOCK_TIME + seq as i64),
                failed,
            },
        });
        signature
    }
}

/// Unique, well-formed signature for transactions not built from a real key.
fn synthetic_signature(seq: u64) -> TxSignature {
    let mut bytes = [0xA5u8; 64];
    bytes[..8].copy_from_slice(&seq.to_be_bytes());
    TxSignature::from_bytes(&bytes)
}

#[async_trait]
impl LedgerQuery for InMemoryLedger {
    async fn signatures_for_address(
        &self,
        address: &Address,
        page: &SignaturePage,
    ) -> Result<Vec<TxSignature>, LedgerError> {
        self.signature_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated outage".into()));
        }

        let entries = self.entries.read().await;
        let mut newest_first = entries
            .iter()
            .rev()
            .filter(|e| &e.program == address)
            .map(|e| &e.tx.signature);

        if let Some(before) = &page.before {
            // An unknown `before` yields nothing, like the real node.
            if !newest_first.any(|sig| sig == before) {
                return Ok(Vec::new());
            }
        }

        Ok(newest_first
            .take_while(|sig| page.until.as_ref() != Some(*sig))
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn transaction(
        &self,
        signature: &TxSignature,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        if self.broken_fetches.read().await.contains(signature) {
            return Err(LedgerError::Transport(format!("simulated fetch failure for {signature}")));
        }
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|e| &e.tx.signature == signature)
            .map(|e| e.tx.clone()))
    }
}

#[async_trait]
impl LedgerSubmit for InMemoryLedger {
    async fn submit(
        &self,
        signer: &SigningKey,
        program: &Address,
        payload: &[u8],
    ) -> Result<TxSignature, LedgerError> {
        let mut entries = self.entries.write().await;
        let seq = entries.len() as u64;

        let mut blockhash = [0u8; 32];
        blockhash[..8].copy_from_slice(&seq.to_be_bytes());
        let signed = build_signed(signer, program, &blockhash, payload)
            .map_err(|e: TransactionError| LedgerError::InvalidTransaction(e.to_string()))?;

        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected(signed.signature, "simulated rejection".into()));
        }

        entries.push(Entry {
            program: *program,
            tx: LedgerTransaction {
                signature: signed.signature.clone(),
                sender: Address::new(signer.verifying_key().to_bytes()),
                payload: Some(payload.to_vec()),
                block_time: Some(GENESIS_BLOCK_TIME + seq as i64),
                failed: false,
            },
        });
        Ok(signed.signature)
    }
}
