//! Key file handling for the local signing identity
//!
//! The key file is a JSON array of the 64 keypair bytes (`seed || public`),
//! the same layout the Solana CLI writes. It is created on first use and
//! never overwritten afterwards: a file that fails to parse is reported, and
//! the user decides what to do with it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use whisper_core::keys::IdentityError;
use whisper_core::Identity;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("IO error on key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("No key file path configured and no default data directory available")]
    NoPath,
}

/// Public identity details, safe to print
#[derive(Debug, Clone, Serialize)]
pub struct IdentityInfo {
    /// Ledger address (base58)
    pub address: String,
    /// X25519 public key (hex)
    pub encryption_public: String,
    pub key_path: String,
}

impl IdentityInfo {
    pub fn new(identity: &Identity, key_path: &Path) -> Result<Self, KeyFileError> {
        let keys = identity.encryption_keypair().map_err(|e| KeyFileError::Invalid {
            path: key_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            address: identity.address().to_string(),
            encryption_public: hex::encode(keys.public()),
            key_path: key_path.display().to_string(),
        })
    }
}

/// A keypair file on disk
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Key file at the configured path, or at the default location.
    pub fn from_config(path: Option<PathBuf>) -> Result<Self, KeyFileError> {
        path.map(Self::new).ok_or(KeyFileError::NoPath)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn io_err(&self, source: std::io::Error) -> KeyFileError {
        KeyFileError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> KeyFileError {
        KeyFileError::Invalid {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Load the identity. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<Identity>, KeyFileError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        let bytes: Vec<u8> = serde_json::from_str(&contents)
            .map_err(|e| self.invalid(format!("expected a JSON array of bytes: {e}")))?;
        let identity = Identity::from_keypair_bytes(&bytes).map_err(|e| match e {
            IdentityError::InvalidLength(n) => self.invalid(format!("expected 64 bytes, got {n}")),
            IdentityError::PublicKeyMismatch => self.invalid(e.to_string()),
        })?;

        tracing::debug!(
            address = %identity.address(),
            path = %self.path.display(),
            "Loaded identity"
        );
        Ok(Some(identity))
    }

    /// Write the identity atomically with owner-only permissions.
    pub fn save(&self, identity: &Identity) -> Result<(), KeyFileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }

        let json = serde_json::to_string(&identity.to_keypair_bytes().to_vec())
            .map_err(|e| self.invalid(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| self.io_err(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_err(e))?;
        }

        file.write_all(json.as_bytes()).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// Load the identity, generating and saving a new one on first run.
    ///
    /// Returns the identity and whether it was just created.
    pub fn load_or_create(&self) -> Result<(Identity, bool), KeyFileError> {
        if let Some(identity) = self.load()? {
            return Ok((identity, false));
        }

        let identity = Identity::generate();
        self.save(&identity)?;

        tracing::info!(
            address = %identity.address(),
            path = %self.path.display(),
            "Generated new identity"
        );
        Ok((identity, true))
    }
}
