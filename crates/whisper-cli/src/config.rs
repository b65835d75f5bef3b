//! Configuration management for the whisper CLI
//!
//! Configuration is stored in TOML format.
//!
//! # Configuration File Locations
//!
//! - Linux: `~/.config/whisper/whisper.toml`
//! - macOS: `~/Library/Application Support/io.solwhisper.whisper/whisper.toml`
//! - Windows: `%APPDATA%\solwhisper\whisper\config\whisper.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use whisper_core::ledger::{Commitment, MAX_PAGE_LIMIT};
use whisper_core::Address;

/// Program that carries whisper envelopes on devnet.
pub const DEFAULT_PROGRAM_ID: &str = "MSG247fHe9juUsj7MwhDyuoLn9sRZFzvxuLZptmL8Rg";

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// CLI configuration
///
/// # Example TOML
///
/// ```toml
/// [identity]
/// # key_path = "/path/to/id.json"
///
/// [ledger]
/// rpc_url = "https://api.devnet.solana.com"
/// program_id = "MSG247fHe9juUsj7MwhDyuoLn9sRZFzvxuLZptmL8Rg"
/// timeout_seconds = 30
/// page_limit = 1000
/// commitment = "confirmed"
/// confirm_timeout_seconds = 60
/// poll_interval_ms = 500
///
/// [storage]
/// # db_path = "/path/to/whisper.db"
///
/// [output]
/// format = "table"  # "table" | "json" | "quiet"
/// verbose = false
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Path to the keypair file (empty = default location)
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// Ledger connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Base58 program id whose instruction data carries envelopes
    #[serde(default = "default_program_id")]
    pub program_id: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Signatures requested per page while scanning
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// "processed" | "confirmed" | "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// How long `send` waits for its transaction to reach `commitment`
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_seconds: u64,

    /// Delay between confirmation status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_program_id() -> String {
    DEFAULT_PROGRAM_ID.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_limit() -> usize {
    MAX_PAGE_LIMIT
}

fn default_commitment() -> String {
    Commitment::default().as_str().to_string()
}

fn default_confirm_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            program_id: default_program_id(),
            timeout_seconds: default_timeout(),
            page_limit: default_page_limit(),
            commitment: default_commitment(),
            confirm_timeout_seconds: default_confirm_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn program(&self) -> Result<Address, ConfigError> {
        self.program_id.parse().map_err(|e| {
            ConfigError::ValidationError(format!("Invalid program_id '{}': {}", self.program_id, e))
        })
    }

    pub fn commitment(&self) -> Result<Commitment, ConfigError> {
        self.commitment.parse().map_err(ConfigError::ValidationError)
    }
}

/// Message database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database (empty = default location)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "table", "json", "quiet"
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub verbose: bool,
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("io", "solwhisper", "whisper")
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("whisper.toml"))
    }

    pub fn config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (key file, message database)
    pub fn data_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Resolved key file path: configured, else `<data dir>/id.json`.
    pub fn key_path(&self) -> Option<PathBuf> {
        self.identity
            .key_path
            .clone()
            .or_else(|| Self::data_dir().map(|d| d.join("id.json")))
    }

    /// Resolved database path: configured, else `<data dir>/whisper.db`.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.storage
            .db_path
            .clone()
            .or_else(|| Self::data_dir().map(|d| d.join("whisper.db")))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        if let Some(path) = Self::default_path() {
            if !path.exists() {
                let config = Self::default();
                config.save(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_formats = ["table", "json", "quiet"];
        if !valid_formats.contains(&self.output.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid output format '{}'. Valid values: {:?}",
                self.output.format, valid_formats
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        if self.ledger.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.ledger.confirm_timeout_seconds == 0 || self.ledger.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "confirm_timeout_seconds and poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.ledger.poll_interval() >= self.ledger.confirm_timeout() {
            return Err(ConfigError::ValidationError(format!(
                "poll_interval_ms ({}) must be shorter than confirm_timeout_seconds ({})",
                self.ledger.poll_interval_ms, self.ledger.confirm_timeout_seconds
            )));
        }

        if !(1..=MAX_PAGE_LIMIT).contains(&self.ledger.page_limit) {
            return Err(ConfigError::ValidationError(format!(
                "page_limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, self.ledger.page_limit
            )));
        }

        let url = url::Url::parse(&self.ledger.rpc_url).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid rpc_url '{}': {}", self.ledger.rpc_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::ValidationError(format!(
                "Invalid rpc_url '{}': must start with http:// or https://",
                self.ledger.rpc_url
            )));
        }

        self.ledger.program()?;
        self.ledger.commitment()?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_toml() -> &'static str {
        r#"# whisper configuration

[identity]
# Path to the keypair file (empty = default location)
# key_path = ""

[ledger]
rpc_url = "https://api.devnet.solana.com"
program_id = "MSG247fHe9juUsj7MwhDyuoLn9sRZFzvxuLZptmL8Rg"
# Per-request timeout in seconds
timeout_seconds = 30
# Signatures per page while scanning (1-1000)
page_limit = 1000
# "processed", "confirmed" or "finalized"
commitment = "confirmed"
# How long `send` waits for confirmation, and how often it polls
confirm_timeout_seconds = 60
poll_interval_ms = 500

[storage]
# Path to the message database (empty = default location)
# db_path = ""

[output]
# Output format: "table", "json", "quiet"
format = "table"
verbose = false

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "warn"
"#
    }
}

/// CLI configuration overrides
///
/// Command-line arguments take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    pub rpc_url: Option<String>,
    pub key_path: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to configuration
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref format) = overrides.output_format {
            self.output.format = format.clone();
        }
        if let Some(verbose) = overrides.verbose {
            self.output.verbose = verbose;
        }
        if let Some(debug) = overrides.debug {
            if debug {
                self.logging.level = "debug".to_string();
            }
        }
        if let Some(ref url) = overrides.rpc_url {
            self.ledger.rpc_url = url.clone();
        }
        if let Some(ref path) = overrides.key_path {
            self.identity.key_path = Some(path.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.identity.key_path.is_none());

        assert_eq!(config.ledger.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.ledger.program_id, DEFAULT_PROGRAM_ID);
        assert_eq!(config.ledger.timeout_seconds, 30);
        assert_eq!(config.ledger.page_limit, 1000);
        assert_eq!(config.ledger.commitment, "confirmed");

        assert!(config.storage.db_path.is_none());

        assert_eq!(config.output.format, "table");
        assert!(!config.output.verbose);

        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_output_format() {
        let mut config = Config::default();
        config.output.format = "xml".to_string();

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid output format"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.ledger.timeout_seconds = 0;

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_validate_page_limit_range() {
        let mut config = Config::default();
        config.ledger.page_limit = 0;
        assert!(config.validate().unwrap_err().to_string().contains("page_limit"));

        config.ledger.page_limit = 1001;
        assert!(config.validate().is_err());

        config.ledger.page_limit = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut config = Config::default();
        config.ledger.rpc_url = "not-a-url".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("Invalid rpc_url"));

        config.ledger.rpc_url = "ftp://api.devnet.solana.com".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("http"));
    }

    #[test]
    fn test_validate_invalid_program_id() {
        let mut config = Config::default();
        config.ledger.program_id = "tooshort".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("program_id"));
    }

    #[test]
    fn test_validate_invalid_commitment() {
        let mut config = Config::default();
        config.ledger.commitment = "max".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("commitment"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = Config::default();
        config.ledger.page_limit = 250;
        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.ledger.page_limit, 250);
        assert_eq!(config.output.format, loaded.output.format);
        assert_eq!(config.logging.level, loaded.logging.level);
    }

    #[test]
    fn test_cli_overrides() {
        let overrides = CliOverrides {
            output_format: Some("json".to_string()),
            verbose: Some(true),
            debug: Some(true),
            rpc_url: Some("http://127.0.0.1:8899".to_string()),
            key_path: Some(PathBuf::from("/tmp/id.json")),
        };

        let config = Config::default().with_overrides(&overrides);

        assert_eq!(config.output.format, "json");
        assert!(config.output.verbose);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.key_path(), Some(PathBuf::from("/tmp/id.json")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let config = Config::default().with_overrides(&CliOverrides::default());
        assert_eq!(config.ledger.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_content = r#"
[ledger]
rpc_url = "http://localhost:8899"
timeout_seconds = 60
commitment = "finalized"

[storage]
db_path = "/var/lib/whisper/messages.db"

[output]
format = "json"
verbose = true

[logging]
level = "debug"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.ledger.rpc_url, "http://localhost:8899");
        assert_eq!(config.ledger.timeout_seconds, 60);
        assert_eq!(config.ledger.commitment().unwrap(), Commitment::Finalized);
        // Unset fields take their defaults
        assert_eq!(config.ledger.program_id, DEFAULT_PROGRAM_ID);
        assert_eq!(
            config.db_path(),
            Some(PathBuf::from("/var/lib/whisper/messages.db"))
        );
        assert_eq!(config.output.format, "json");
        assert!(config.output.verbose);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_sample_toml_is_valid() {
        let config: Config = toml::from_str(Config::sample_toml()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_path_name() {
        if let Some(path) = Config::default_path() {
            assert!(path.to_string_lossy().ends_with("whisper.toml"));
            assert_eq!(path.parent().map(Path::to_path_buf), Config::config_dir());
        }
    }

    #[test]
    fn test_confirmation_settings() {
        let config = Config::default();
        assert_eq!(config.ledger.confirm_timeout(), Duration::from_secs(60));
        assert_eq!(config.ledger.poll_interval(), Duration::from_millis(500));

        let parsed: Config = toml::from_str(
            r#"
[ledger]
confirm_timeout_seconds = 5
poll_interval_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(parsed.ledger.confirm_timeout(), Duration::from_secs(5));
        assert_eq!(parsed.ledger.poll_interval(), Duration::from_millis(250));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_confirmation_settings_validation() {
        let mut config = Config::default();
        config.ledger.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ledger.confirm_timeout_seconds = 1;
        config.ledger.poll_interval_ms = 2000;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("poll_interval_ms"));
    }

    #[test]
    fn test_load_from_custom_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");

        let config = Config::default();
        config.save(&config_path).unwrap();

        let loaded = Config::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.ledger.rpc_url, loaded.ledger.rpc_url);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[output]\nformat = \"yaml\"\n").unwrap();

        assert!(matches!(
            Config::load(&config_path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
