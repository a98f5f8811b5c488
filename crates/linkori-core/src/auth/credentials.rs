//! Persistent storage for the bearer credential.
//!
//! The store is a best-effort mirror of the session's credential. Every
//! failure is logged and degrades to "no credential"; callers never see an
//! error.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Keychain service name
const SERVICE_NAME: &str = "linkori";

/// Credential file name inside the per-origin data directory
const CREDENTIAL_FILE: &str = "credential.json";

/// One scalar slot holding the bearer credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str);
    fn clear(&self);
}

impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn load(&self) -> Option<String> {
        (**self).load()
    }

    fn save(&self, token: &str) {
        (**self).save(token)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn load(&self) -> Option<String> {
        (**self).load()
    }

    fn save(&self, token: &str) {
        (**self).save(token)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// Which backend persists the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyring" => Ok(StoreBackend::Keyring),
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown credential store: {}", other)),
        }
    }
}

/// Build the store for a backend, scoped to one API origin.
pub fn open_store(backend: StoreBackend, origin: &str) -> Result<Box<dyn CredentialStore>> {
    let store: Box<dyn CredentialStore> = match backend {
        StoreBackend::Keyring => Box::new(KeyringStore::new(origin)),
        StoreBackend::File => {
            let store = FileStore::for_origin(origin)?;
            debug!(path = %store.path().display(), "Using credential file");
            Box::new(store)
        }
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}

// ============================================================================
// Keychain
// ============================================================================

/// Credential slot in the OS keychain, one entry per origin.
pub struct KeyringStore {
    account: String,
}

impl KeyringStore {
    pub fn new(origin: &str) -> Self {
        Self {
            account: origin.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }

    fn try_load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn try_save(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store credential in keychain")
    }

    fn try_clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> Option<String> {
        self.try_load().unwrap_or_else(|e| {
            warn!(error = %e, "Keychain unavailable, treating credential as absent");
            None
        })
    }

    fn save(&self, token: &str) {
        if let Err(e) = self.try_save(token) {
            warn!(error = %e, "Failed to persist credential");
        }
    }

    fn clear(&self) {
        if let Err(e) = self.try_clear() {
            warn!(error = %e, "Failed to clear persisted credential");
        }
    }
}

// ============================================================================
// File
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Credential slot in a JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store under the user data directory, e.g.
    /// `~/.local/share/linkori/127.0.0.1_8000/credential.json`.
    pub fn for_origin(origin: &str) -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(Self::new(
            data_dir
                .join(SERVICE_NAME)
                .join(sanitize_origin(origin))
                .join(CREDENTIAL_FILE),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read credential file")?;
        let stored: StoredCredential =
            serde_json::from_str(&contents).context("Failed to parse credential file")?;
        if stored.access_token.is_empty() {
            return Ok(None);
        }
        Ok(Some(stored.access_token))
    }

    fn try_save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&StoredCredential {
            access_token: token.to_string(),
        })?;
        std::fs::write(&self.path, contents).context("Failed to write credential file")?;
        Ok(())
    }

    fn try_clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Option<String> {
        self.try_load().unwrap_or_else(|e| {
            warn!(
                error = %e,
                path = %self.path.display(),
                "Credential file unreadable, treating as absent"
            );
            None
        })
    }

    fn save(&self, token: &str) {
        if let Err(e) = self.try_save(token) {
            warn!(error = %e, path = %self.path.display(), "Failed to persist credential");
        } else {
            debug!(path = %self.path.display(), "Credential persisted");
        }
    }

    fn clear(&self) {
        if let Err(e) = self.try_clear() {
            warn!(
                error = %e,
                path = %self.path.display(),
                "Failed to clear persisted credential"
            );
        }
    }
}

/// Turn an origin like `127.0.0.1:8000` into a directory name.
fn sanitize_origin(origin: &str) -> String {
    origin
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ============================================================================
// Memory
// ============================================================================

/// Process-local slot. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, token: &str) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(token.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
