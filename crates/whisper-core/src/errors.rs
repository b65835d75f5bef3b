//! Unified error type for callers that drive several flows.
//!
//! Each module keeps its own error enum. `CoreError` wraps them so a front end
//! can report any failure uniformly and pick a response by [`ErrorCategory`].

use thiserror::Error;

use whisper_crypto::keys::ConversionError;
use whisper_crypto::sealed_box::{AuthenticationError, CryptoBoxError};

use crate::envelope::DecodeError;
use crate::keys::IdentityError;
use crate::ledger::LedgerError;
use crate::scan::ScanError;
use crate::send::SendError;
use crate::store::StoreError;
use crate::types::AddressError;

/// Broad classes of failure, used for exit codes and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad user input: addresses, keys, oversized messages
    InvalidInput,
    /// The ledger could not be reached or answered badly
    LedgerUnavailable,
    /// The ledger refused or never confirmed a transaction
    SubmissionFailed,
    Storage,
    /// Another scan pass holds the lock
    Busy,
    /// Cryptographic failure on data we produced ourselves
    Internal,
}

impl ErrorCategory {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::LedgerUnavailable | ErrorCategory::Busy | ErrorCategory::Storage
        )
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    CryptoBox(#[from] CryptoBoxError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

fn ledger_category(e: &LedgerError) -> ErrorCategory {
    match e {
        LedgerError::Rejected(..) | LedgerError::ConfirmationTimeout(_) => {
            ErrorCategory::SubmissionFailed
        }
        LedgerError::InvalidTransaction(_) => ErrorCategory::InvalidInput,
        LedgerError::Transport(_) | LedgerError::Rpc { .. } | LedgerError::BadResponse(_) => {
            ErrorCategory::LedgerUnavailable
        }
    }
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Address(_)
            | CoreError::Identity(_)
            | CoreError::Conversion(_)
            | CoreError::Decode(_) => ErrorCategory::InvalidInput,
            CoreError::CryptoBox(_) | CoreError::Authentication(_) => ErrorCategory::Internal,
            CoreError::Ledger(e) => ledger_category(e),
            CoreError::Store(_) => ErrorCategory::Storage,
            CoreError::Send(e) => match e {
                SendError::InvalidRecipient(_)
                | SendError::UnsupportedKey(_)
                | SendError::LocalKey(_)
                | SendError::MessageTooLong { .. } => ErrorCategory::InvalidInput,
                SendError::Encryption(_) | SendError::Encoding(_) => ErrorCategory::Internal,
                // A confirmed send that failed to record is still a storage problem.
                SendError::Persist { .. } => ErrorCategory::Storage,
                SendError::SubmissionFailed(LedgerError::Transport(_)) => {
                    ErrorCategory::SubmissionFailed
                }
                SendError::SubmissionFailed(inner) => match ledger_category(inner) {
                    ErrorCategory::LedgerUnavailable => ErrorCategory::SubmissionFailed,
                    other => other,
                },
            },
            CoreError::Scan(e) => match e {
                ScanError::QueryFailed(_) => ErrorCategory::LedgerUnavailable,
                ScanError::Store(_) => ErrorCategory::Storage,
                ScanError::AlreadyRunning => ErrorCategory::Busy,
                ScanError::LocalKey(_) => ErrorCategory::InvalidInput,
            },
        }
    }
}
