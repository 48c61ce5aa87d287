//! Authentication adapters: credential storage, the refresh grant client and
//! registration credentials

pub mod refresher;
pub mod registration;
pub mod token_store;
pub mod vault;

pub use refresher::HttpTokenRefresher;
pub use registration::TimeStepRegistrationCredential;
pub use token_store::{InMemoryTokenStore, SecureTokenStore};
pub use vault::{KeyringVault, MemoryVault, SecretVault, VaultError};
