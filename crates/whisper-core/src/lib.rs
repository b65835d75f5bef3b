//! Whisper Core - encrypted messaging over a public ledger.
//!
//! This crate implements:
//! - The on-ledger envelope codec
//! - The send flow (seal, encode, submit, record)
//! - The incremental scan engine with an explicit checkpoint
//! - Ledger and storage collaborators, with in-memory implementations
//! - A Solana JSON-RPC ledger client (`rpc` feature)
//! - SQLite persistence (`sqlite` feature)

#![forbid(unsafe_code)]

// Flows
pub mod send;
pub mod scan;

// Wire formats
pub mod envelope;
pub mod transaction;

// Collaborators
pub mod ledger;
pub mod store;

// Supporting modules
pub mod errors;
pub mod types;
pub mod keys;
pub mod harness;

#[cfg(feature = "rpc")]
pub mod rpc;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

#[cfg(test)]
mod proptests;

pub use errors::{CoreError, ErrorCategory};
pub use keys::Identity;
pub use scan::{CandidateOutcome, ScanEngine, ScanError, ScanReport, SkipReason};
pub use send::{SendError, SendFlow, SendReceipt};
pub use types::{Address, Direction, MessageRecord, ScanCheckpoint, TxSignature};
