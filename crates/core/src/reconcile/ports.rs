//! Port interface for the local record store

use async_trait::async_trait;
use finsync_domain::{CacheRecord, ReconcileReport, ReconciliationScope, RecordId, Result};

use super::reconciler::reconcile_in_steps;

/// Split of an upsert batch into new and overwritten rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// Persistent store for one record type.
#[async_trait]
pub trait CacheRepository<R: CacheRecord>: Send + Sync {
    /// Insert or overwrite every record by id.
    async fn insert_all(&self, records: &[R]) -> Result<UpsertOutcome>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize>;

    /// Ids of every stored record inside `scope`.
    async fn select_ids_where(&self, scope: &ReconciliationScope) -> Result<Vec<RecordId>>;

    /// Every stored record inside `scope`, ordered by id.
    async fn select_where(&self, scope: &ReconciliationScope) -> Result<Vec<R>>;

    /// Insert or overwrite a single record.
    async fn upsert(&self, record: &R) -> Result<()> {
        self.insert_all(std::slice::from_ref(record)).await.map(|_| ())
    }

    /// Remove every record of this type.
    async fn clear(&self) -> Result<usize> {
        let ids = self.select_ids_where(&ReconciliationScope::of::<R>()).await?;
        self.delete_by_ids(&ids).await
    }

    /// Make the in-scope id set equal to `records`' id set.
    ///
    /// The default runs the steps separately, upsert strictly before delete.
    /// Stores with transactions override this to make the whole pass atomic
    /// to readers.
    async fn reconcile_scope(
        &self,
        scope: &ReconciliationScope,
        records: &[R],
    ) -> Result<ReconcileReport> {
        reconcile_in_steps(self, scope, records).await
    }
}
