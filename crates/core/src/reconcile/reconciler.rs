//! Cache reconciliation engine
//!
//! Merges a scoped server response into the local store:
//! 1. Upsert every record in the response
//! 2. Collect the response's ids
//! 3. Select the ids currently stored inside the scope
//! 4. Stale ids are stored ids the response no longer contains
//! 5. Delete the stale ids
//!
//! Afterwards the in-scope id set equals the response id set. Records outside
//! the scope are never deleted, and an empty response empties the scope.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use finsync_domain::constants::EVENT_CHANNEL_CAPACITY;
use finsync_domain::{
    CacheEvent, CacheRecord, ReconcileReport, ReconciliationScope, RecordId, Result, SdkError,
    ServerEntity,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};

use super::ports::{CacheRepository, UpsertOutcome};

/// Ids present in `existing` but absent from `incoming`, ascending.
pub fn stale_ids<R: CacheRecord>(
    existing: impl IntoIterator<Item = RecordId>,
    incoming: &[R],
) -> Vec<RecordId> {
    let incoming: HashSet<RecordId> = incoming.iter().map(CacheRecord::id).collect();
    let mut stale: Vec<RecordId> =
        existing.into_iter().filter(|id| !incoming.contains(id)).collect();
    stale.sort_unstable();
    stale.dedup();
    stale
}

/// Reconcile through the repository's individual operations, upsert strictly
/// before delete.
///
/// # Errors
/// Propagates the first repository failure. A failure after the upsert leaves
/// the new records in place and the stale ones undeleted.
pub async fn reconcile_in_steps<R, S>(
    repository: &S,
    scope: &ReconciliationScope,
    records: &[R],
) -> Result<ReconcileReport>
where
    R: CacheRecord,
    S: CacheRepository<R> + ?Sized,
{
    let outcome =
        if records.is_empty() { UpsertOutcome::default() } else { repository.insert_all(records).await? };

    let existing = repository.select_ids_where(scope).await?;
    let stale = stale_ids(existing, records);
    if !stale.is_empty() {
        repository.delete_by_ids(&stale).await?;
    }

    Ok(ReconcileReport {
        scope: scope.clone(),
        inserted: outcome.inserted,
        updated: outcome.updated,
        deleted_ids: stale,
    })
}

/// Runs reconciliations, one at a time per scope.
///
/// Different scopes proceed concurrently.
pub struct CacheReconciler {
    locks: DashMap<String, Arc<Mutex<()>>>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for CacheReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheReconciler {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { locks: DashMap::new(), events }
    }

    /// Subscribe to cache change events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Publish a change made outside reconciliation.
    pub fn publish(&self, event: CacheEvent) {
        let _ = self.events.send(event);
    }

    /// Map a server response with `map` and reconcile it into `scope`.
    ///
    /// Entities that fail to decode are skipped with a warning. Their ids are
    /// still part of the response, so a cached copy of them is kept as is.
    ///
    /// # Errors
    /// Non-decode mapping failures and repository failures.
    pub async fn reconcile<R, W, S, F>(
        &self,
        repository: &S,
        scope: &ReconciliationScope,
        entities: Vec<W>,
        map: F,
    ) -> Result<ReconcileReport>
    where
        R: CacheRecord,
        W: ServerEntity + Send,
        S: CacheRepository<R> + ?Sized,
        F: Fn(W) -> Result<R> + Send,
    {
        let mut records = Vec::with_capacity(entities.len());
        let mut skipped = HashSet::new();
        for entity in entities {
            let id = entity.server_id();
            match map(entity) {
                Ok(record) => records.push(record),
                Err(SdkError::Decode(reason)) => {
                    warn!(scope = %scope, id, %reason, "skipping record that failed to decode");
                    skipped.insert(id);
                }
                Err(err) => return Err(err),
            }
        }
        if skipped.is_empty() {
            return self.reconcile_records(repository, scope, &records).await;
        }

        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;
        let retained: Vec<R> = repository
            .select_where(scope)
            .await?
            .into_iter()
            .filter(|record| skipped.contains(&record.id()))
            .collect();
        let retained_count = retained.len();
        records.extend(retained);

        let mut report = self.apply(repository, scope, &records).await?;
        report.updated = report.updated.saturating_sub(retained_count);
        self.publish(CacheEvent::Reconciled(report.clone()));
        Ok(report)
    }

    /// Reconcile already-mapped records into `scope`.
    ///
    /// # Errors
    /// Repository failures.
    #[instrument(skip_all, fields(scope = %scope, incoming = records.len()))]
    pub async fn reconcile_records<R, S>(
        &self,
        repository: &S,
        scope: &ReconciliationScope,
        records: &[R],
    ) -> Result<ReconcileReport>
    where
        R: CacheRecord,
        S: CacheRepository<R> + ?Sized,
    {
        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;
        debug!("scope lock acquired");

        let report = self.apply(repository, scope, records).await?;
        self.publish(CacheEvent::Reconciled(report.clone()));
        Ok(report)
    }

    /// One repository pass. Callers hold the scope lock.
    async fn apply<R, S>(
        &self,
        repository: &S,
        scope: &ReconciliationScope,
        records: &[R],
    ) -> Result<ReconcileReport>
    where
        R: CacheRecord,
        S: CacheRepository<R> + ?Sized,
    {
        let report = repository.reconcile_scope(scope, records).await?;
        info!(
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted(),
            "scope reconciled"
        );
        Ok(report)
    }

    fn scope_lock(&self, scope: &ReconciliationScope) -> Arc<Mutex<()>> {
        self.locks.entry(scope.key()).or_default().clone()
    }
}
