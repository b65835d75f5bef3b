//! Whisper CLI - encrypted messages over Solana
//!
//! This crate provides the `whisper` command-line interface:
//! - Sending encrypted messages to a Solana address
//! - Scanning the ledger for new incoming messages
//! - Reading the local message history
//! - Inspecting the local identity and its balance

pub mod cli;
pub mod config;
pub mod identity;
pub mod output;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use whisper_core::ErrorCategory;

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Invalid input (bad address, message too long, bad config or key file)
/// - 3: Ledger unavailable (RPC unreachable or misbehaving)
/// - 4: Submission failed (transaction rejected or not confirmed)
/// - 5: Storage error (message database)
/// - 6: A scan pass is already running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidInput = 2,
    LedgerUnavailable = 3,
    SubmissionFailed = 4,
    StorageError = 5,
    ScanAlreadyRunning = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ErrorCategory> for ExitCode {
    fn from(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::InvalidInput => ExitCode::InvalidInput,
            ErrorCategory::LedgerUnavailable => ExitCode::LedgerUnavailable,
            ErrorCategory::SubmissionFailed => ExitCode::SubmissionFailed,
            ErrorCategory::Storage => ExitCode::StorageError,
            ErrorCategory::Busy => ExitCode::ScanAlreadyRunning,
            ErrorCategory::Internal => ExitCode::GeneralError,
        }
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::LedgerUnavailable => "LEDGER_UNAVAILABLE",
            ExitCode::SubmissionFailed => "SUBMISSION_FAILED",
            ExitCode::StorageError => "STORAGE_ERROR",
            ExitCode::ScanAlreadyRunning => "SCAN_ALREADY_RUNNING",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::InvalidInput => "Invalid arguments, configuration or key file",
            ExitCode::LedgerUnavailable => "The ledger RPC endpoint could not be used",
            ExitCode::SubmissionFailed => "The transaction was rejected or never confirmed",
            ExitCode::StorageError => "The message database could not be read or written",
            ExitCode::ScanAlreadyRunning => "Another scan pass is in progress",
        }
    }
}
