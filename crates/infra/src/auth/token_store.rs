//! Token store implementations
//!
//! [`SecureTokenStore`] keeps the credential as three vault entries. Every
//! read and write of the three entries happens under one lock, so in-process
//! readers always see a credential that came from a single write.

use finsync_core::TokenStore;
use finsync_domain::constants::{ACCESS_TOKEN_EXPIRY_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use finsync_domain::{Credential, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::vault::{KeyringVault, SecretVault};

/// Credential store over a [`SecretVault`].
pub struct SecureTokenStore<V: SecretVault> {
    vault: V,
    lock: RwLock<()>,
}

impl SecureTokenStore<KeyringVault> {
    /// Store backed by the platform keychain under `service_name`.
    pub fn keychain(service_name: impl Into<String>) -> Self {
        Self::new(KeyringVault::new(service_name))
    }
}

impl<V: SecretVault> SecureTokenStore<V> {
    pub fn new(vault: V) -> Self {
        Self { vault, lock: RwLock::new(()) }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }
}

impl<V: SecretVault> TokenStore for SecureTokenStore<V> {
    fn get(&self) -> Result<Option<Credential>> {
        let _guard = self.lock.read();

        let access = self.vault.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.vault.get(REFRESH_TOKEN_KEY)?.filter(|token| !token.is_empty());
        if access.is_none() && refresh.is_none() {
            return Ok(None);
        }

        // An access token without a readable expiry is treated as expired.
        let expiry = match self.vault.get(ACCESS_TOKEN_EXPIRY_KEY)? {
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                warn!("stored access token expiry is not a number, treating as expired");
                0
            }),
            None => 0,
        };

        Ok(Some(Credential::new(access.unwrap_or_default(), refresh, expiry)))
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        let _guard = self.lock.write();

        // Expiry and refresh token land before the access token that makes
        // the session look logged in.
        self.vault
            .set(ACCESS_TOKEN_EXPIRY_KEY, &credential.access_token_expiry_epoch_seconds.to_string())?;
        match credential.refresh_token() {
            Some(refresh) => self.vault.set(REFRESH_TOKEN_KEY, refresh)?,
            None => self.vault.delete(REFRESH_TOKEN_KEY)?,
        }
        self.vault.set(ACCESS_TOKEN_KEY, &credential.access_token)?;

        debug!(expiry = credential.access_token_expiry_epoch_seconds, "credential stored");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.write();

        self.vault.delete(ACCESS_TOKEN_KEY)?;
        self.vault.delete(REFRESH_TOKEN_KEY)?;
        self.vault.delete(ACCESS_TOKEN_EXPIRY_KEY)?;

        debug!("credential cleared");
        Ok(())
    }
}

/// Credential held in process memory only.
#[derive(Default)]
pub struct InMemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self { credential: RwLock::new(Some(credential)) }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self) -> Result<Option<Credential>> {
        Ok(self.credential.read().clone())
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        *self.credential.write() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.credential.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::auth::vault::MemoryVault;

    fn store() -> SecureTokenStore<MemoryVault> {
        SecureTokenStore::new(MemoryVault::new())
    }

    #[test]
    fn set_then_get_returns_same_credential() {
        let store = store();
        let credential = Credential::new("a", Some("r".into()), 1_700_000_000);

        store.set(&credential).unwrap();
        assert_eq!(store.get().unwrap(), Some(credential));
    }

    #[test]
    fn clear_removes_every_key() {
        let store = store();
        store.set(&Credential::new("a", Some("r".into()), 10)).unwrap();

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        assert!(store.vault().is_empty());
    }

    #[test]
    fn missing_refresh_token_removes_the_stale_one() {
        let store = store();
        store.set(&Credential::new("a", Some("r".into()), 10)).unwrap();
        store.set(&Credential::new("b", None, 20)).unwrap();

        let credential = store.get().unwrap().unwrap();
        assert_eq!(credential.access_token, "b");
        assert_eq!(credential.refresh_token, None);
    }

    #[test]
    fn access_token_without_expiry_reads_as_expired() {
        let store = store();
        store.vault().set(ACCESS_TOKEN_KEY, "a").unwrap();

        let credential = store.get().unwrap().unwrap();
        assert_eq!(credential.access_token_expiry_epoch_seconds, 0);
        assert!(credential.is_expired(1));
    }

    #[test]
    fn orphaned_refresh_token_is_still_usable() {
        let store = store();
        store.vault().set(REFRESH_TOKEN_KEY, "r").unwrap();

        let credential = store.get().unwrap().unwrap();
        assert!(!credential.has_access_token());
        assert_eq!(credential.refresh_token(), Some("r"));
    }

    /// Validates that readers never observe fields from two different writes.
    ///
    /// Assertions:
    /// - Every credential read has matching access token, refresh token and
    ///   expiry suffixes.
    #[test]
    fn concurrent_readers_see_whole_credentials() {
        let store = Arc::new(store());
        store.set(&Credential::new("a-0", Some("r-0".into()), 0)).unwrap();

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 1..500_i64 {
                    store.set(&Credential::new(format!("a-{i}"), Some(format!("r-{i}")), i)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let credential = store.get().unwrap().unwrap();
                        let n = credential.access_token_expiry_epoch_seconds;
                        assert_eq!(credential.access_token, format!("a-{n}"));
                        assert_eq!(credential.refresh_token(), Some(format!("r-{n}").as_str()));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryTokenStore::new();
        assert_eq!(store.get().unwrap(), None);

        let credential = Credential::new("a", None, 5);
        store.set(&credential).unwrap();
        assert_eq!(store.get().unwrap(), Some(credential));

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }
}
