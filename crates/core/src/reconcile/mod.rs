//! Cache reconciliation

pub mod ports;
pub mod reconciler;

pub use ports::{CacheRepository, UpsertOutcome};
pub use reconciler::{reconcile_in_steps, stale_ids, CacheReconciler};
