//! SQLite-backed cache repository.
//!
//! Every record type shares the `cache_records` table, keyed by entity and
//! id. Payloads are stored as JSON; the scope columns (`account_id`,
//! `category`) are copied out of the record on every write. All database
//! operations run in `spawn_blocking` to avoid blocking the async runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use finsync_core::reconcile::stale_ids;
use finsync_core::{CacheRepository, UpsertOutcome};
use finsync_domain::{
    now_epoch_seconds, CacheRecord, ReconcileReport, ReconciliationScope, RecordId, Result,
    SdkError,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use tokio::task;
use tracing::{debug, warn};

use super::manager::{map_sql_error, DbManager};
use crate::errors::map_join_error;

// Stays well below SQLITE_MAX_VARIABLE_NUMBER on every build.
const DELETE_CHUNK: usize = 500;

const SCOPE_FILTER: &str =
    "entity = ?1 AND (?2 IS NULL OR account_id = ?2) AND (?3 IS NULL OR category = ?3)";

/// Cache repository for one record type over the shared cache table.
pub struct SqliteCacheRepository<R> {
    db: Arc<DbManager>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for SqliteCacheRepository<R> {
    fn clone(&self) -> Self {
        Self { db: Arc::clone(&self.db), _record: PhantomData }
    }
}

impl<R: CacheRecord> SqliteCacheRepository<R> {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db, _record: PhantomData }
    }

    /// Stored record by id.
    pub async fn get(&self, id: RecordId) -> Result<Option<R>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<R>> {
            let conn = db.get_connection()?;
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM cache_records WHERE entity = ?1 AND id = ?2",
                    params![R::ENTITY, id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;
            payload.map(|payload| decode_payload::<R>(&payload)).transpose()
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl<R: CacheRecord> CacheRepository<R> for SqliteCacheRepository<R> {
    async fn insert_all(&self, records: &[R]) -> Result<UpsertOutcome> {
        let db = Arc::clone(&self.db);
        let rows = encode_rows(records)?;

        task::spawn_blocking(move || -> Result<UpsertOutcome> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let outcome = upsert_rows(&tx, R::ENTITY, &rows)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(outcome)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let ids = ids.to_vec();

        task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let deleted = delete_ids(&tx, R::ENTITY, &ids)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(deleted)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn select_ids_where(&self, scope: &ReconciliationScope) -> Result<Vec<RecordId>> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();

        task::spawn_blocking(move || -> Result<Vec<RecordId>> {
            let conn = db.get_connection()?;
            select_ids(&conn, &scope)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn select_where(&self, scope: &ReconciliationScope) -> Result<Vec<R>> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();

        task::spawn_blocking(move || -> Result<Vec<R>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("SELECT id, payload FROM cache_records WHERE {SCOPE_FILTER} ORDER BY id"))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![scope.entity, scope.account_id, scope.category], |row| {
                    Ok((row.get::<_, RecordId>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(map_sql_error)?;

            let mut records = Vec::new();
            for row in rows {
                let (id, payload) = row.map_err(map_sql_error)?;
                match decode_payload::<R>(&payload) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!(entity = R::ENTITY, id, error = %err, "skipping unreadable cached record"),
                }
            }
            Ok(records)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn clear(&self) -> Result<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM cache_records WHERE entity = ?1", params![R::ENTITY])
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Whole pass in one `IMMEDIATE` transaction; readers see the scope
    /// either before or after reconciliation.
    async fn reconcile_scope(
        &self,
        scope: &ReconciliationScope,
        records: &[R],
    ) -> Result<ReconcileReport> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();
        let rows = encode_rows(records)?;
        let records = records.to_vec();

        task::spawn_blocking(move || -> Result<ReconcileReport> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let outcome = upsert_rows(&tx, R::ENTITY, &rows)?;
            let existing = select_ids(&tx, &scope)?;
            let stale = stale_ids(existing, &records);
            delete_ids(&tx, R::ENTITY, &stale)?;

            tx.commit().map_err(map_sql_error)?;
            debug!(scope = %scope, stale = stale.len(), "reconcile transaction committed");

            Ok(ReconcileReport {
                scope,
                inserted: outcome.inserted,
                updated: outcome.updated,
                deleted_ids: stale,
            })
        })
        .await
        .map_err(map_join_error)?
    }
}

struct EncodedRow {
    id: RecordId,
    account_id: Option<i64>,
    category: Option<String>,
    payload: String,
}

fn encode_rows<R: CacheRecord>(records: &[R]) -> Result<Vec<EncodedRow>> {
    records
        .iter()
        .map(|record| -> Result<EncodedRow> {
            let payload = serde_json::to_string(record).map_err(|e| {
                SdkError::Decode(format!("failed to encode {} {}: {e}", R::ENTITY, record.id()))
            })?;
            Ok(EncodedRow {
                id: record.id(),
                account_id: record.account_id(),
                category: record.category(),
                payload,
            })
        })
        .collect()
}

fn decode_payload<R: CacheRecord>(payload: &str) -> Result<R> {
    serde_json::from_str(payload)
        .map_err(|e| SdkError::Decode(format!("invalid cached {} payload: {e}", R::ENTITY)))
}

fn upsert_rows(conn: &Connection, entity: &str, rows: &[EncodedRow]) -> Result<UpsertOutcome> {
    let synced_at = now_epoch_seconds();
    let mut exists = conn
        .prepare_cached("SELECT 1 FROM cache_records WHERE entity = ?1 AND id = ?2")
        .map_err(map_sql_error)?;
    let mut upsert = conn
        .prepare_cached(
            "INSERT INTO cache_records (entity, id, account_id, category, payload, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(entity, id) DO UPDATE SET
                account_id = excluded.account_id,
                category = excluded.category,
                payload = excluded.payload,
                synced_at = excluded.synced_at",
        )
        .map_err(map_sql_error)?;

    let mut outcome = UpsertOutcome::default();
    for row in rows {
        let existed = exists.exists(params![entity, row.id]).map_err(map_sql_error)?;
        upsert
            .execute(params![entity, row.id, row.account_id, row.category, row.payload, synced_at])
            .map_err(map_sql_error)?;
        if existed {
            outcome.updated += 1;
        } else {
            outcome.inserted += 1;
        }
    }
    Ok(outcome)
}

fn select_ids(conn: &Connection, scope: &ReconciliationScope) -> Result<Vec<RecordId>> {
    let mut stmt = conn
        .prepare_cached(&format!("SELECT id FROM cache_records WHERE {SCOPE_FILTER}"))
        .map_err(map_sql_error)?;
    let ids = stmt
        .query_map(params![scope.entity, scope.account_id, scope.category], |row| row.get(0))
        .map_err(map_sql_error)?
        .collect::<rusqlite::Result<Vec<RecordId>>>()
        .map_err(map_sql_error)?;
    Ok(ids)
}

fn delete_ids(conn: &Connection, entity: &str, ids: &[RecordId]) -> Result<usize> {
    let mut deleted = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("DELETE FROM cache_records WHERE entity = ? AND id IN ({placeholders})");
        let params = std::iter::once(rusqlite::types::Value::from(entity.to_string()))
            .chain(chunk.iter().map(|id| rusqlite::types::Value::from(*id)));
        deleted += conn.execute(&sql, params_from_iter(params)).map_err(map_sql_error)?;
    }
    Ok(deleted)
}
