//! In-memory port implementations

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use finsync_core::{
    CacheRepository, HttpRequest, HttpResponse, TokenRefresher, TokenStore, Transport,
    TransportError, UpsertOutcome,
};
use finsync_domain::{
    now_epoch_seconds, CacheRecord, Credential, ReconciliationScope, RecordId, Result, SdkError,
};
use parking_lot::{Mutex, RwLock};

/// `TokenStore` over a single lock.
#[derive(Default)]
pub struct MemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new(credential: Option<Credential>) -> Self {
        Self { credential: RwLock::new(credential) }
    }

    pub fn access_token(&self) -> Option<String> {
        self.credential.read().as_ref().map(|c| c.access_token.clone())
    }
}

impl TokenStore for MemoryTokenStore {
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

/// Refresher that counts calls and answers after an optional delay.
///
/// Successful refreshes hand out `access-1`, `access-2`, ... and rotate the
/// refresh token the same way.
pub struct CountingRefresher {
    calls: AtomicUsize,
    delay: Duration,
    failure: Mutex<Option<SdkError>>,
    seen_refresh_tokens: Mutex<Vec<String>>,
}

impl CountingRefresher {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            failure: Mutex::new(None),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: SdkError, delay: Duration) -> Arc<Self> {
        let refresher = Self::with_delay(delay);
        *refresher.failure.lock() = Some(error);
        refresher
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().clone()
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_refresh_tokens.lock().push(refresh_token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(Credential::new(
            format!("access-{call}"),
            Some(format!("refresh-{call}")),
            now_epoch_seconds() + 3_600,
        ))
    }
}

type Handler = dyn Fn(&HttpRequest) -> std::result::Result<HttpResponse, TransportError> + Send + Sync;

/// Transport answering every request through a closure and recording what
/// was sent.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    sent: Mutex<Vec<HttpRequest>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> std::result::Result<HttpResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_delay(handler, Duration::ZERO)
    }

    pub fn with_delay<F>(handler: F, delay: Duration) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> std::result::Result<HttpResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self { handler: Box::new(handler), sent: Mutex::new(Vec::new()), delay })
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().clone()
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.sent.lock().iter().map(|r| r.bearer().map(str::to_owned)).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        self.sent.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request)
    }
}

/// `CacheRepository` over a sorted map, using the default step-wise
/// reconciliation.
pub struct MemoryRepository<R> {
    rows: Mutex<BTreeMap<RecordId, R>>,
}

impl<R: CacheRecord> MemoryRepository<R> {
    pub fn new() -> Self {
        Self { rows: Mutex::new(BTreeMap::new()) }
    }

    pub fn seeded(records: Vec<R>) -> Self {
        Self { rows: Mutex::new(records.into_iter().map(|r| (r.id(), r)).collect()) }
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.rows.lock().keys().copied().collect()
    }

    pub fn get(&self, id: RecordId) -> Option<R> {
        self.rows.lock().get(&id).cloned()
    }
}

#[async_trait]
impl<R: CacheRecord> CacheRepository<R> for MemoryRepository<R> {
    async fn insert_all(&self, records: &[R]) -> Result<UpsertOutcome> {
        let mut rows = self.rows.lock();
        let mut outcome = UpsertOutcome::default();
        for record in records {
            if rows.insert(record.id(), record.clone()).is_some() {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize> {
        let mut rows = self.rows.lock();
        Ok(ids.iter().filter(|id| rows.remove(id).is_some()).count())
    }

    async fn select_ids_where(&self, scope: &ReconciliationScope) -> Result<Vec<RecordId>> {
        Ok(self.rows.lock().values().filter(|r| scope.contains(*r)).map(CacheRecord::id).collect())
    }

    async fn select_where(&self, scope: &ReconciliationScope) -> Result<Vec<R>> {
        Ok(self.rows.lock().values().filter(|r| scope.contains(*r)).cloned().collect())
    }
}
