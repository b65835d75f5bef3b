//! CLI command definitions and argument parsing

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;
use whisper_core::rpc::SolanaRpcClient;
use whisper_core::sqlite_store::SqliteStore;
use whisper_core::store::Store;
use whisper_core::{Address, CoreError, Identity, MessageRecord, ScanEngine, SendFlow};

use crate::config::{Config, ConfigError};
use crate::identity::{IdentityInfo, KeyFile, KeyFileError};
use crate::output::{OutputFormat, OutputFormatter};
use crate::ExitCode;

/// Whisper - encrypted messages over Solana
#[derive(Parser, Debug)]
#[command(name = "whisper")]
#[command(version, about = "Encrypted messages over Solana")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: table, json, quiet (default from config)
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Solana JSON-RPC endpoint
    #[arg(long, global = true, env = "WHISPER_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Keypair file (JSON array of 64 bytes)
    #[arg(long, global = true, env = "WHISPER_KEYPAIR")]
    pub keypair: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send an encrypted message
    Send(SendArgs),
    /// Scan the ledger for new messages
    Check,
    /// Show stored message history
    Read(ReadArgs),
    /// Inspect the local identity
    #[command(subcommand)]
    Identity(IdentityAction),
}

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Recipient address (base58)
    #[arg(long)]
    pub to: String,

    /// Message text
    pub message: String,
}

#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Only messages exchanged with this address
    #[arg(long)]
    pub with: Option<String>,

    /// Show only the most recent N messages
    #[arg(long)]
    pub last: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum IdentityAction {
    /// Show address, encryption key and key file location
    Show,
    /// Show the account balance in SOL
    Balance,
}

/// Failure of a single command, carrying enough to pick an exit code
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    KeyFile(#[from] KeyFileError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No {0} path configured and no default data directory available")]
    NoDataDir(&'static str),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CommandError::Core(e) => e.category().into(),
            CommandError::KeyFile(KeyFileError::Io { .. }) => ExitCode::GeneralError,
            CommandError::KeyFile(_)
            | CommandError::Config(_)
            | CommandError::NoDataDir(_)
            | CommandError::InvalidArgument(_) => ExitCode::InvalidInput,
            CommandError::Io(_) => ExitCode::GeneralError,
        }
    }

    /// Whether running the same command again later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommandError::Core(e) if e.category().is_retryable())
    }
}

impl Cli {
    /// Config overrides carried by the global flags
    pub fn overrides(&self) -> crate::config::CliOverrides {
        crate::config::CliOverrides {
            output_format: self.output.map(|f| f.to_string()),
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
            rpc_url: self.rpc_url.clone(),
            key_path: self.keypair.clone(),
        }
    }

    /// Execute the command with a resolved configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let format: OutputFormat = config.output.format.parse().unwrap_or_default();
        let formatter = OutputFormatter::new(format, config.output.verbose);

        match self.run(&config, &formatter).await {
            Ok(()) => Ok(ExitCode::Success),
            Err(e) => {
                let code = e.exit_code();
                tracing::debug!(error = ?e, exit_code = code.name(), "Command failed");
                let rendered = formatter.format_error_with_code(&e, code, e.is_retryable());
                match formatter.format() {
                    OutputFormat::Json => println!("{rendered}"),
                    OutputFormat::Table => eprintln!("{rendered}"),
                    OutputFormat::Quiet => {}
                }
                Ok(code)
            }
        }
    }

    async fn run(self, config: &Config, formatter: &OutputFormatter) -> Result<(), CommandError> {
        config.validate()?;

        match self.command {
            Commands::Send(args) => send(config, formatter, args).await,
            Commands::Check => check(config, formatter).await,
            Commands::Read(args) => read(config, formatter, args).await,
            Commands::Identity(IdentityAction::Show) => identity_show(config, formatter),
            Commands::Identity(IdentityAction::Balance) => identity_balance(config, formatter).await,
        }
    }
}

fn load_identity(config: &Config, formatter: &OutputFormatter) -> Result<(Identity, KeyFile), CommandError> {
    let key_file = KeyFile::from_config(config.key_path())?;
    let (identity, created) = key_file.load_or_create()?;
    if created {
        formatter.warning(&format!(
            "Generated a new identity {} at {}",
            identity.address(),
            key_file.path().display()
        ));
    }
    Ok((identity, key_file))
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>, CommandError> {
    let path = config.db_path().ok_or(CommandError::NoDataDir("database"))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteStore::new(&path).map_err(CoreError::from)?;
    Ok(Arc::new(store))
}

fn rpc_client(config: &Config) -> Result<Arc<SolanaRpcClient>, CommandError> {
    let client = SolanaRpcClient::new(
        config.ledger.rpc_url.clone(),
        config.ledger.program()?,
        config.ledger.timeout(),
        config.ledger.commitment()?,
    )
    .map_err(CoreError::from)?
    .with_confirmation(config.ledger.confirm_timeout(), config.ledger.poll_interval());
    Ok(Arc::new(client))
}

async fn send(config: &Config, formatter: &OutputFormatter, args: SendArgs) -> Result<(), CommandError> {
    let (identity, _) = load_identity(config, formatter)?;
    let flow = SendFlow::new(rpc_client(config)?, open_store(config)?, config.ledger.program()?);

    formatter.progress(&format!("Sending to {}...", args.to));
    let receipt = flow
        .send(&identity, &args.to, &args.message)
        .await
        .map_err(CoreError::from)?;

    println!("{}", formatter.format_receipt(&receipt, &config.ledger.rpc_url));
    Ok(())
}

async fn check(config: &Config, formatter: &OutputFormatter) -> Result<(), CommandError> {
    let (identity, _) = load_identity(config, formatter)?;
    let engine = ScanEngine::new(rpc_client(config)?, open_store(config)?, config.ledger.program()?)
        .with_page_limit(config.ledger.page_limit);

    formatter.progress(&format!("Scanning for messages to {}...", identity.address()));
    let report = engine.run_pass(&identity).await.map_err(CoreError::from)?;

    println!("{}", formatter.format_scan(&report));
    Ok(())
}

async fn read(config: &Config, formatter: &OutputFormatter, args: ReadArgs) -> Result<(), CommandError> {
    let (identity, _) = load_identity(config, formatter)?;
    let with = args
        .with
        .as_deref()
        .map(|s| {
            s.parse::<Address>()
                .map_err(|e| CommandError::InvalidArgument(format!("Invalid address '{s}': {e}")))
        })
        .transpose()?;

    let store = open_store(config)?;
    let history = store.list_messages().await.map_err(CoreError::from)?;
    let records = select_history(history, &identity.address(), with.as_ref(), args.last);

    println!("{}", formatter.format_messages(&records));
    Ok(())
}

/// History for `local`, optionally narrowed to one counterparty and the newest `last` entries.
fn select_history(
    history: Vec<MessageRecord>,
    local: &Address,
    with: Option<&Address>,
    last: Option<usize>,
) -> Vec<MessageRecord> {
    let mut records: Vec<_> = history
        .into_iter()
        .filter(|r| &r.local_address == local)
        .filter(|r| with.map_or(true, |w| &r.counterparty == w))
        .collect();
    if let Some(n) = last {
        let skip = records.len().saturating_sub(n);
        records.drain(..skip);
    }
    records
}

fn identity_show(config: &Config, formatter: &OutputFormatter) -> Result<(), CommandError> {
    let (identity, key_file) = load_identity(config, formatter)?;
    let info = IdentityInfo::new(&identity, key_file.path())?;
    println!("{}", formatter.format_identity(&info));
    Ok(())
}

async fn identity_balance(config: &Config, formatter: &OutputFormatter) -> Result<(), CommandError> {
    let (identity, _) = load_identity(config, formatter)?;
    let client = rpc_client(config)?;

    formatter.progress(&format!("Querying {}...", client.url()));
    let lamports = client
        .get_balance(&identity.address())
        .await
        .map_err(CoreError::from)?;

    println!("{}", formatter.format_balance(&identity.address().to_string(), lamports));
    Ok(())
}
