//! Incremental scan of the ledger for messages addressed to the local identity.
//!
//! A pass lists every signature newer than the checkpoint (newest first,
//! paging until the range is exhausted), inspects each transaction in that
//! order and records the ones that decrypt. Every inspected transaction gets
//! an explicit [`CandidateOutcome`]. The new checkpoint is the newest listed
//! signature, whether or not it carried a message for us.
//!
//! Only a ledger read failure or a store failure aborts a pass. In both cases
//! the checkpoint is left untouched and the same range is retried next time.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use whisper_crypto::keys::{derive_public, ConversionError, EncryptionKeypair};
use whisper_crypto::sealed_box::open;
use whisper_crypto::utils::keys_equal;

use crate::envelope::{self, DecodeError};
use crate::keys::Identity;
use crate::ledger::{LedgerError, LedgerQuery, SignaturePage, MAX_PAGE_LIMIT};
use crate::store::{Store, StoreError};
use crate::types::{Address, Direction, MessageRecord, ScanCheckpoint, TxSignature};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("ledger query failed: {0}")]
    QueryFailed(#[from] LedgerError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("a scan pass is already running")]
    AlreadyRunning,

    #[error("local identity cannot be used for decryption: {0}")]
    LocalKey(ConversionError),
}

/// Why a candidate transaction produced no new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Unknown to the ledger, or no instruction for the program
    MissingPayload,
    FailedTransaction,
    Malformed(DecodeError),
    NotAddressedToUs,
    UnsupportedSenderKey,
    AuthenticationFailed,
    InvalidUtf8,
    AlreadyRecorded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingPayload => f.write_str("missing payload"),
            SkipReason::FailedTransaction => f.write_str("failed transaction"),
            SkipReason::Malformed(e) => write!(f, "malformed envelope: {e}"),
            SkipReason::NotAddressedToUs => f.write_str("not addressed to us"),
            SkipReason::UnsupportedSenderKey => f.write_str("unsupported sender key"),
            SkipReason::AuthenticationFailed => f.write_str("authentication failed"),
            SkipReason::InvalidUtf8 => f.write_str("plaintext is not UTF-8"),
            SkipReason::AlreadyRecorded => f.write_str("already recorded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Delivered(MessageRecord),
    Skipped(SkipReason),
}

impl CandidateOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, CandidateOutcome::Delivered(_))
    }
}

/// Result of one completed scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Checkpoint to persist: the newest signature listed in this pass, or the
    /// input checkpoint if nothing new was listed.
    pub checkpoint: ScanCheckpoint,
    /// Newly created records, newest first.
    pub records: Vec<MessageRecord>,
    /// Every inspected signature with its outcome, newest first.
    pub outcomes: Vec<(TxSignature, CandidateOutcome)>,
}

impl ScanReport {
    pub fn inspected(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_delivered()).count()
    }

    pub fn outcome_for(&self, signature: &TxSignature) -> Option<&CandidateOutcome> {
        self.outcomes
            .iter()
            .find(|(sig, _)| sig == signature)
            .map(|(_, outcome)| outcome)
    }
}

/// Scans one program's transaction history. One pass at a time per engine.
pub struct ScanEngine<L: LedgerQuery + ?Sized, S: Store + ?Sized> {
    ledger: Arc<L>,
    store: Arc<S>,
    program: Address,
    page_limit: usize,
    pass_guard: Mutex<()>,
}

impl<L: LedgerQuery + ?Sized, S: Store + ?Sized> ScanEngine<L, S> {
    pub fn new(ledger: Arc<L>, store: Arc<S>, program: Address) -> Self {
        Self {
            ledger,
            store,
            program,
            page_limit: MAX_PAGE_LIMIT,
            pass_guard: Mutex::new(()),
        }
    }

    /// Signatures requested per page, clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// Run one pass from `checkpoint`. The caller persists `report.checkpoint`.
    pub async fn scan(
        &self,
        identity: &Identity,
        checkpoint: &ScanCheckpoint,
    ) -> Result<ScanReport, ScanError> {
        let _guard = self
            .pass_guard
            .try_lock()
            .map_err(|_| ScanError::AlreadyRunning)?;
        self.scan_locked(identity, checkpoint).await
    }

    /// Load `identity`'s stored checkpoint, run one pass, and save the new checkpoint.
    pub async fn run_pass(&self, identity: &Identity) -> Result<ScanReport, ScanError> {
        let _guard = self
            .pass_guard
            .try_lock()
            .map_err(|_| ScanError::AlreadyRunning)?;

        let local = identity.address();
        let checkpoint = self.store.load_checkpoint(&local).await?;
        let report = self.scan_locked(identity, &checkpoint).await?;
        if report.checkpoint != checkpoint {
            self.store.save_checkpoint(&local, &report.checkpoint).await?;
        }
        Ok(report)
    }

    async fn scan_locked(
        &self,
        identity: &Identity,
        checkpoint: &ScanCheckpoint,
    ) -> Result<ScanReport, ScanError> {
        let local_keys = identity.encryption_keypair().map_err(ScanError::LocalKey)?;
        let local_address = identity.address();

        let signatures = self.list_new_signatures(checkpoint).await?;
        debug!(
            count = signatures.len(),
            checkpoint = ?checkpoint.last_seen_signature,
            "listed new signatures"
        );

        let new_checkpoint = match signatures.first() {
            Some(newest) => ScanCheckpoint::at(newest.clone()),
            None => checkpoint.clone(),
        };

        let mut report = ScanReport {
            checkpoint: new_checkpoint,
            records: Vec::new(),
            outcomes: Vec::with_capacity(signatures.len()),
        };

        for signature in signatures {
            let outcome = self
                .inspect(&signature, &local_address, &local_keys)
                .await?;
            match &outcome {
                CandidateOutcome::Delivered(record) => {
                    debug!(signature = %signature, from = %record.counterparty, "message delivered");
                    report.records.push(record.clone());
                }
                CandidateOutcome::Skipped(reason) => {
                    debug!(signature = %signature, reason = %reason, "candidate skipped");
                }
            }
            report.outcomes.push((signature, outcome));
        }

        info!(
            count = report.records.len(),
            inspected = report.inspected(),
            skipped = report.skipped(),
            checkpoint = ?report.checkpoint.last_seen_signature,
            "scan pass complete"
        );

        Ok(report)
    }

    /// Page backwards from the newest signature down to the checkpoint.
    async fn list_new_signatures(
        &self,
        checkpoint: &ScanCheckpoint,
    ) -> Result<Vec<TxSignature>, LedgerError> {
        let mut all = Vec::new();
        let mut page = SignaturePage {
            before: None,
            until: checkpoint.last_seen_signature.clone(),
            limit: self.page_limit,
        };

        loop {
            let batch = self
                .ledger
                .signatures_for_address(&self.program, &page)
                .await?;
            let full = batch.len() >= page.limit;
            let oldest = batch.last().cloned();
            all.extend(batch);

            match oldest {
                Some(oldest) if full => page.before = Some(oldest),
                _ => break,
            }
        }

        Ok(all)
    }

    async fn inspect(
        &self,
        signature: &TxSignature,
        local_address: &Address,
        local_keys: &EncryptionKeypair,
    ) -> Result<CandidateOutcome, ScanError> {
        use CandidateOutcome::Skipped;

        let Some(tx) = self.ledger.transaction(signature).await? else {
            return Ok(Skipped(SkipReason::MissingPayload));
        };
        if tx.failed {
            return Ok(Skipped(SkipReason::FailedTransaction));
        }
        let Some(payload) = tx.payload else {
            return Ok(Skipped(SkipReason::MissingPayload));
        };

        let envelope = match envelope::decode(&payload) {
            Ok(envelope) => envelope,
            Err(e) => return Ok(Skipped(SkipReason::Malformed(e))),
        };

        if !keys_equal(&envelope.recipient, local_address.as_bytes()) {
            return Ok(Skipped(SkipReason::NotAddressedToUs));
        }

        let Ok(sender_x) = derive_public(tx.sender.as_bytes()) else {
            return Ok(Skipped(SkipReason::UnsupportedSenderKey));
        };

        let plaintext = match open(
            &envelope.ciphertext,
            &envelope.nonce,
            &sender_x,
            local_keys.secret(),
        ) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                warn!(signature = %signature, sender = %tx.sender, "envelope addressed to us failed authentication");
                return Ok(Skipped(SkipReason::AuthenticationFailed));
            }
        };

        let Ok(text) = String::from_utf8(plaintext) else {
            return Ok(Skipped(SkipReason::InvalidUtf8));
        };

        let timestamp_ms = match tx.block_time {
            Some(secs) => secs.saturating_mul(1000),
            None => chrono::Utc::now().timestamp_millis(),
        };

        let record = MessageRecord {
            signature: signature.clone(),
            local_address: *local_address,
            counterparty: tx.sender,
            timestamp_ms,
            text,
            direction: Direction::Incoming,
        };

        if self.store.insert_message(record.clone()).await? {
            Ok(CandidateOutcome::Delivered(record))
        } else {
            Ok(Skipped(SkipReason::AlreadyRecorded))
        }
    }
}
