//! Storage abstraction for message history and the scan checkpoint.
//!
//! This module defines the `Store` trait and provides an in-memory
//! implementation for tests and ephemeral use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::{Address, MessageRecord, ScanCheckpoint, TxSignature};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("storage operation failed: {0}")]
    OperationFailed(String),

    #[error("data corruption detected: {0}")]
    DataCorruption(String),
}

// ============================================================================
// Store Trait
// ============================================================================

/// Persistence for message records and per-identity scan checkpoints.
///
/// Records are unique by transaction signature; inserting the same signature
/// twice leaves exactly one record. Each local address has its own checkpoint,
/// so identities sharing one store never bound each other's scans.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a record unless one with the same signature exists.
    ///
    /// # Returns
    /// * `Ok(true)` if the record was inserted
    /// * `Ok(false)` if a record with this signature was already present
    async fn insert_message(&self, record: MessageRecord) -> Result<bool, StoreError>;

    /// All records, oldest first.
    async fn list_messages(&self) -> Result<Vec<MessageRecord>, StoreError>;

    /// Checkpoint for `local`; empty if that identity has never scanned.
    async fn load_checkpoint(&self, local: &Address) -> Result<ScanCheckpoint, StoreError>;

    async fn save_checkpoint(
        &self,
        local: &Address,
        checkpoint: &ScanCheckpoint,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// In-Memory Store Implementation
// ============================================================================

/// Thread-safe in-memory store.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    /// Records indexed by signature
    messages: Arc<RwLock<HashMap<TxSignature, MessageRecord>>>,
    checkpoints: Arc<RwLock<HashMap<Address, ScanCheckpoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory store wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_message(&self, record: MessageRecord) -> Result<bool, StoreError> {
        let mut messages = self.messages.write().await;
        if messages.contains_key(&record.signature) {
            return Ok(false);
        }
        messages.insert(record.signature.clone(), record);
        Ok(true)
    }

    async fn list_messages(&self) -> Result<Vec<MessageRecord>, StoreError> {
        let messages = self.messages.read().await;
        let mut out: Vec<MessageRecord> = messages.values().cloned().collect();
        out.sort_by(|a, b| {
            a.timestamp_ms
                .cmp(&b.timestamp_ms)
                .then_with(|| a.signature.as_str().cmp(b.signature.as_str()))
        });
        Ok(out)
    }

    async fn load_checkpoint(&self, local: &Address) -> Result<ScanCheckpoint, StoreError> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(local)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_checkpoint(
        &self,
        local: &Address,
        checkpoint: &ScanCheckpoint,
    ) -> Result<(), StoreError> {
        self.checkpoints
            .write()
            .await
            .insert(*local, checkpoint.clone());
        Ok(())
    }
}
