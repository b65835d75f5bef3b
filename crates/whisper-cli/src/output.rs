//! Output formatting for CLI results
//!
//! Every command renders through [`OutputFormatter`] in one of three modes:
//! - Table: human-readable tables (default)
//! - JSON: a consistent response wrapper for scripting
//! - Quiet: nothing on stdout, exit code only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use whisper_core::rpc::LAMPORTS_PER_SOL;
use whisper_core::{MessageRecord, ScanReport, SendReceipt};

use crate::identity::IdentityInfo;
use crate::ExitCode;

const EXPLORER_BASE: &str = "https://explorer.solana.com/tx";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }

    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::success(data)
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// Explorer link for a transaction, with the cluster inferred from the RPC URL.
pub fn explorer_url(signature: &str, rpc_url: &str) -> String {
    if rpc_url.contains("devnet") {
        format!("{EXPLORER_BASE}/{signature}?cluster=devnet")
    } else if rpc_url.contains("testnet") {
        format!("{EXPLORER_BASE}/{signature}?cluster=testnet")
    } else if rpc_url.contains("mainnet") {
        format!("{EXPLORER_BASE}/{signature}")
    } else {
        format!("{EXPLORER_BASE}/{signature}?cluster=custom&customUrl={rpc_url}")
    }
}

/// Lamports rendered as SOL with nine decimals.
pub fn format_sol(lamports: u64) -> String {
    format!(
        "{}.{:09}",
        lamports / LAMPORTS_PER_SOL,
        lamports % LAMPORTS_PER_SOL
    )
}

pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Format the result of `send`
    pub fn format_receipt(&self, receipt: &SendReceipt, rpc_url: &str) -> String {
        let output = ReceiptOutput::new(receipt, rpc_url);
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Signature", &output.signature]);
                table.add_row(vec!["Recipient", &output.recipient]);
                table.add_row(vec!["Sent At", &output.sent_at]);
                table.add_row(vec!["Explorer", &output.explorer_url]);
                format!("Message sent.\n{table}")
            }
            OutputFormat::Json => self.to_json_response(&output, "send"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format the result of a `check` pass
    pub fn format_scan(&self, report: &ScanReport) -> String {
        match self.format {
            OutputFormat::Table => {
                let found = report.records.len();
                let mut out = format!("Found {found} new message(s)");
                if found > 0 {
                    out.push('\n');
                    out.push_str(&messages_table(&report.records));
                }
                if self.verbose && report.skipped() > 0 {
                    out.push_str(&format!(
                        "\n{} of {} transaction(s) skipped",
                        report.skipped(),
                        report.inspected()
                    ));
                }
                out
            }
            OutputFormat::Json => self.to_json_response(&ScanOutput::from(report), "check"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format stored history
    pub fn format_messages(&self, records: &[MessageRecord]) -> String {
        match self.format {
            OutputFormat::Table => {
                if records.is_empty() {
                    "No messages yet.".to_string()
                } else {
                    messages_table(records)
                }
            }
            OutputFormat::Json => self.to_json_response(&MessagesOutput::from(records), "read"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_identity(&self, info: &IdentityInfo) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Address", &info.address]);
                table.add_row(vec!["Encryption Key", &info.encryption_public]);
                table.add_row(vec!["Key File", &info.key_path]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(info, "identity show"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_balance(&self, address: &str, lamports: u64) -> String {
        let output = BalanceOutput {
            address: address.to_string(),
            lamports,
            sol: format_sol(lamports),
        };
        match self.format {
            OutputFormat::Table => {
                let mut out = format!("{} SOL", output.sol);
                if lamports == 0 {
                    out.push_str(&format!(
                        "\nThis account is empty. On devnet, fund it with:\n  solana airdrop 1 {address} --url devnet"
                    ));
                }
                out
            }
            OutputFormat::Json => self.to_json_response(&output, "identity balance"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format an error together with the exit code it maps to.
    /// `retryable` adds a hint that running the command again may succeed.
    pub fn format_error_with_code(
        &self,
        error: &dyn std::fmt::Display,
        code: ExitCode,
        retryable: bool,
    ) -> String {
        match self.format {
            OutputFormat::Table if retryable => {
                format!("Error: {error}\n{}. Try again later.", code.description())
            }
            OutputFormat::Table => format!("Error: {error}"),
            OutputFormat::Json => {
                let output = ErrorOutput {
                    success: false,
                    error: error.to_string(),
                    exit_code: i32::from(code),
                    exit_code_name: code.name(),
                    exit_code_description: code.description(),
                    retryable,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                };
                self.to_json(&output)
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress line on stderr, verbose table mode only
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Table => eprintln!("⚠ {message}"),
            OutputFormat::Json => {
                println!(
                    "{}",
                    self.to_json(&WarningOutput {
                        warning: message.to_string(),
                        timestamp: chrono::Utc::now().to_rfc3339(),
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }
}

fn property_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);
    table
}

fn messages_table(records: &[MessageRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Time", "Direction", "Counterparty", "Message"]);
    for record in records {
        table.add_row(vec![
            format_time(record.timestamp_ms),
            record.direction.as_str().to_string(),
            record.counterparty.to_string(),
            record.text.clone(),
        ]);
    }
    table.to_string()
}

fn format_time(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn format_time_iso(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

// JSON output structures

#[derive(Serialize)]
struct MessageJson {
    signature: String,
    direction: &'static str,
    counterparty: String,
    text: String,
    timestamp_ms: i64,
    timestamp_iso: String,
}

impl From<&MessageRecord> for MessageJson {
    fn from(r: &MessageRecord) -> Self {
        Self {
            signature: r.signature.to_string(),
            direction: r.direction.as_str(),
            counterparty: r.counterparty.to_string(),
            text: r.text.clone(),
            timestamp_ms: r.timestamp_ms,
            timestamp_iso: format_time_iso(r.timestamp_ms),
        }
    }
}

#[derive(Serialize)]
struct MessagesOutput {
    messages: Vec<MessageJson>,
    count: usize,
}

impl From<&[MessageRecord]> for MessagesOutput {
    fn from(records: &[MessageRecord]) -> Self {
        Self {
            count: records.len(),
            messages: records.iter().map(MessageJson::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct ScanOutput {
    new_messages: Vec<MessageJson>,
    found: usize,
    inspected: usize,
    skipped: usize,
    checkpoint: Option<String>,
}

impl From<&ScanReport> for ScanOutput {
    fn from(report: &ScanReport) -> Self {
        Self {
            found: report.records.len(),
            new_messages: report.records.iter().map(MessageJson::from).collect(),
            inspected: report.inspected(),
            skipped: report.skipped(),
            checkpoint: report
                .checkpoint
                .last_seen_signature
                .as_ref()
                .map(|s| s.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ReceiptOutput {
    signature: String,
    recipient: String,
    sent_at: String,
    explorer_url: String,
}

impl ReceiptOutput {
    fn new(receipt: &SendReceipt, rpc_url: &str) -> Self {
        Self {
            signature: receipt.signature.to_string(),
            recipient: receipt.record.counterparty.to_string(),
            sent_at: format_time_iso(receipt.record.timestamp_ms),
            explorer_url: explorer_url(receipt.signature.as_str(), rpc_url),
        }
    }
}

#[derive(Serialize)]
struct BalanceOutput {
    address: String,
    lamports: u64,
    sol: String,
}

#[derive(Serialize)]
struct ErrorOutput {
    success: bool,
    error: String,
    exit_code: i32,
    exit_code_name: &'static str,
    exit_code_description: &'static str,
    retryable: bool,
    timestamp: String,
}

#[derive(Serialize)]
struct WarningOutput {
    warning: String,
    timestamp: String,
}
