//! # finsync Infrastructure
//!
//! Infrastructure implementations of core ports, plus the session facade
//! hosts talk to.
//!
//! This crate contains:
//! - reqwest transport and the refresh grant client
//! - Keychain and in-memory token stores
//! - SQLite and in-memory cache repositories
//! - Configuration loading and tracing setup
//! - Worker pool and callback queue for background operations
//! - Domain services and [`SdkSession`]
//!
//! ## Architecture
//! - Implements traits defined in `finsync-core`
//! - Depends on `finsync-domain` and `finsync-core`
//! - Contains all "impure" code (I/O, keychain, database)

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;
pub mod runtime;
pub mod services;
pub mod session;

// Re-export commonly used items
pub use auth::{
    HttpTokenRefresher, InMemoryTokenStore, KeyringVault, MemoryVault, SecretVault,
    SecureTokenStore, TimeStepRegistrationCredential, VaultError,
};
pub use cache::InMemoryCacheRepository;
pub use database::{DbManager, SqliteCacheRepository};
pub use errors::InfraError;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use runtime::{CallbackQueue, Completion, WorkerPool};
pub use services::{AccountService, GoalService, MessageFilter, MessageService};
pub use session::{SdkSession, SdkSessionBuilder};
