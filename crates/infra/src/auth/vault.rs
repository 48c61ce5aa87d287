//! Secret vaults backing the secure token store
//!
//! A vault is a flat string-to-string map whose values are protected at rest
//! by the platform. [`KeyringVault`] uses the OS keychain (macOS Keychain
//! Access, Windows Credential Manager, Linux Secret Service); [`MemoryVault`]
//! keeps values in process memory for tests and ephemeral sessions.

use std::collections::HashMap;

use finsync_domain::SdkError;
use keyring::Entry;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::errors::InfraError;

/// Vault access failure
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("secure storage unavailable: {0}")]
    Unavailable(String),

    #[error("secure storage access failed for {key}: {reason}")]
    AccessFailed { key: String, reason: String },
}

impl From<VaultError> for SdkError {
    fn from(value: VaultError) -> Self {
        SdkError::Storage(value.to_string())
    }
}

/// Flat secret storage.
pub trait SecretVault: Send + Sync {
    /// Value stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, VaultError>;

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), VaultError>;
}

/// Platform keychain vault, one entry per key under a service name.
pub struct KeyringVault {
    service_name: String,
}

impl KeyringVault {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> Result<Entry, VaultError> {
        Entry::new(&self.service_name, key).map_err(|e| VaultError::Unavailable(describe(e)))
    }
}

impl SecretVault for KeyringVault {
    fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        debug!(service = %self.service_name, key = %key, "reading secret from keychain");
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::AccessFailed { key: key.to_string(), reason: describe(e) }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        debug!(service = %self.service_name, key = %key, "storing secret in keychain");
        self.entry(key)?
            .set_password(value)
            .map_err(|e| VaultError::AccessFailed { key: key.to_string(), reason: describe(e) })
    }

    fn delete(&self, key: &str) -> Result<(), VaultError> {
        debug!(service = %self.service_name, key = %key, "deleting secret from keychain");
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::AccessFailed { key: key.to_string(), reason: describe(e) }),
        }
    }
}

fn describe(err: keyring::Error) -> String {
    SdkError::from(InfraError::from(err)).to_string()
}

/// Process-memory vault.
#[derive(Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SecretVault for MemoryVault {
    fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), VaultError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_vault_delete_is_idempotent() {
        let vault = MemoryVault::new();
        vault.set("k", "v").unwrap();
        assert_eq!(vault.get("k").unwrap().as_deref(), Some("v"));

        vault.delete("k").unwrap();
        vault.delete("k").unwrap();
        assert_eq!(vault.get("k").unwrap(), None);
        assert!(vault.is_empty());
    }

    #[test]
    fn vault_errors_become_storage_errors() {
        let err = VaultError::AccessFailed { key: "access_token".into(), reason: "denied".into() };
        assert!(matches!(SdkError::from(err), SdkError::Storage(msg) if msg.contains("access_token")));
    }
}
