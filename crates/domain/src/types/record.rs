//! Cache records and reconciliation scopes

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Server-assigned record identifier
pub type RecordId = i64;

/// A locally cached domain entity.
///
/// The entity kind, owning account and category are the attributes scopes
/// filter on; any store that can index those three columns can host any
/// record type.
pub trait CacheRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Entity kind shared by every record of this type
    const ENTITY: &'static str;

    /// Stable server-assigned identifier
    fn id(&self) -> RecordId;

    /// Account the record belongs to, if any
    fn account_id(&self) -> Option<i64> {
        None
    }

    /// Category the record currently falls into, if any
    fn category(&self) -> Option<String> {
        None
    }
}

/// Anything that carries a server-assigned id, cached or still on the wire.
///
/// Reconciliation reads the id of a response entity before decoding it, so
/// an entity that fails to decode can keep its cached copy.
pub trait ServerEntity {
    fn server_id(&self) -> RecordId;
}

/// The subset of cached records a sync operation is authoritative over.
///
/// A record is in scope when its entity matches and every criterion that is
/// set matches. Reconciliation never deletes anything outside its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconciliationScope {
    pub entity: String,
    pub account_id: Option<i64>,
    pub category: Option<String>,
}

impl ReconciliationScope {
    /// Every record of one entity kind.
    pub fn all(entity: impl Into<String>) -> Self {
        Self { entity: entity.into(), account_id: None, category: None }
    }

    /// Every record of `R`'s entity kind.
    #[must_use]
    pub fn of<R: CacheRecord>() -> Self {
        Self::all(R::ENTITY)
    }

    /// Restrict the scope to records owned by one account.
    #[must_use]
    pub fn for_account(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Restrict the scope to one category.
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Whether `record` falls inside this scope.
    pub fn contains<R: CacheRecord>(&self, record: &R) -> bool {
        self.matches(R::ENTITY, record.account_id(), record.category().as_deref())
    }

    /// Attribute-level membership test used by stores.
    #[must_use]
    pub fn matches(&self, entity: &str, account_id: Option<i64>, category: Option<&str>) -> bool {
        if self.entity != entity {
            return false;
        }
        if let Some(expected) = self.account_id {
            if account_id != Some(expected) {
                return false;
            }
        }
        if let Some(expected) = self.category.as_deref() {
            if category != Some(expected) {
                return false;
            }
        }
        true
    }

    /// Stable key identifying the scope (used for per-scope locking and logs).
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReconciliationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)?;
        if let Some(account_id) = self.account_id {
            write!(f, "/account={account_id}")?;
        }
        if let Some(category) = &self.category {
            write!(f, "/category={category}")?;
        }
        Ok(())
    }
}

/// Outcome of a single reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub scope: ReconciliationScope,
    /// Records that were not cached before this pass
    pub inserted: usize,
    /// Records overwritten in place
    pub updated: usize,
    /// Stale record ids removed from the scope
    pub deleted_ids: Vec<RecordId>,
}

impl ReconcileReport {
    /// Number of stale records removed.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.deleted_ids.len()
    }

    /// Whether the pass changed nothing but overwrote existing rows.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.deleted_ids.is_empty()
    }
}
