//! Shared test helpers for `finsync-core` integration tests.
//!
//! Lightweight in-memory implementations of every core port so tests can
//! focus on coordination behaviour instead of plumbing.

#![allow(dead_code)]

pub mod fakes;

use std::sync::Arc;

use finsync_core::{CoordinatorOptions, TokenRefreshCoordinator};
use finsync_domain::{now_epoch_seconds, Credential};

pub use fakes::{CountingRefresher, MemoryRepository, MemoryTokenStore, ScriptedTransport};

/// Credential valid for an hour.
pub fn credential(access: &str, refresh: &str) -> Credential {
    Credential::new(access, Some(refresh.to_string()), now_epoch_seconds() + 3_600)
}

/// Credential that expired a minute ago.
pub fn expired_credential(access: &str, refresh: &str) -> Credential {
    Credential::new(access, Some(refresh.to_string()), now_epoch_seconds() - 60)
}

/// Coordinator over a memory store seeded with `stored`.
pub fn coordinator_with(
    stored: Option<Credential>,
    refresher: Arc<CountingRefresher>,
) -> (TokenRefreshCoordinator, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new(stored));
    let coordinator =
        TokenRefreshCoordinator::new(store.clone(), refresher, CoordinatorOptions::default());
    (coordinator, store)
}
