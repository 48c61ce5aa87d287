//! Process-memory cache repository

use std::collections::BTreeMap;

use async_trait::async_trait;
use finsync_core::reconcile::stale_ids;
use finsync_core::{CacheRepository, UpsertOutcome};
use finsync_domain::{CacheRecord, ReconcileReport, ReconciliationScope, RecordId, Result};
use parking_lot::RwLock;

/// Cache repository holding records in a map.
///
/// Reconciliation happens under a single write lock, so readers never see a
/// half-reconciled scope.
pub struct InMemoryCacheRepository<R> {
    records: RwLock<BTreeMap<RecordId, R>>,
}

impl<R> Default for InMemoryCacheRepository<R> {
    fn default() -> Self {
        Self { records: RwLock::new(BTreeMap::new()) }
    }
}

impl<R: CacheRecord> InMemoryCacheRepository<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RecordId) -> Option<R> {
        self.records.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn upsert_into<R: CacheRecord>(map: &mut BTreeMap<RecordId, R>, records: &[R]) -> UpsertOutcome {
    let mut outcome = UpsertOutcome::default();
    for record in records {
        if map.insert(record.id(), record.clone()).is_some() {
            outcome.updated += 1;
        } else {
            outcome.inserted += 1;
        }
    }
    outcome
}

fn ids_in_scope<R: CacheRecord>(map: &BTreeMap<RecordId, R>, scope: &ReconciliationScope) -> Vec<RecordId> {
    map.values().filter(|record| scope.contains(*record)).map(CacheRecord::id).collect()
}

#[async_trait]
impl<R: CacheRecord> CacheRepository<R> for InMemoryCacheRepository<R> {
    async fn insert_all(&self, records: &[R]) -> Result<UpsertOutcome> {
        Ok(upsert_into(&mut self.records.write(), records))
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize> {
        let mut map = self.records.write();
        Ok(ids.iter().filter(|id| map.remove(*id).is_some()).count())
    }

    async fn select_ids_where(&self, scope: &ReconciliationScope) -> Result<Vec<RecordId>> {
        Ok(ids_in_scope(&self.records.read(), scope))
    }

    async fn select_where(&self, scope: &ReconciliationScope) -> Result<Vec<R>> {
        Ok(self.records.read().values().filter(|record| scope.contains(*record)).cloned().collect())
    }

    async fn reconcile_scope(
        &self,
        scope: &ReconciliationScope,
        records: &[R],
    ) -> Result<ReconcileReport> {
        let mut map = self.records.write();
        let outcome = upsert_into(&mut map, records);
        let stale = stale_ids(ids_in_scope(&map, scope), records);
        for id in &stale {
            map.remove(id);
        }
        Ok(ReconcileReport {
            scope: scope.clone(),
            inserted: outcome.inserted,
            updated: outcome.updated,
            deleted_ids: stale,
        })
    }
}
