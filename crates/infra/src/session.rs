//! SDK session: the entry point hosts hold for the lifetime of a login
//!
//! [`SdkSessionBuilder`] wires the adapters in this crate into the core
//! coordinator, interceptor and reconciler. Every piece can be swapped out,
//! which is how the integration tests run against wiremock and in-memory
//! stores.

use std::sync::Arc;
use std::time::Duration;

use finsync_core::{
    AuthInterceptor, CacheReconciler, CacheRepository, CoordinatorOptions, EndpointPolicy,
    HttpRequest, RegistrationCredentialSource, TokenRefreshCoordinator, TokenStore, Transport,
};
use finsync_domain::{
    now_epoch_seconds, Account, AuthenticationState, CacheEvent, Credential, Goal, Message,
    RegisteredUser, RegistrationRequest, Result, SdkConfig, SessionEvent, TokenResponse,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::auth::{HttpTokenRefresher, SecureTokenStore, TimeStepRegistrationCredential};
use crate::cache::InMemoryCacheRepository;
use crate::config::loader::validate;
use crate::database::{DbManager, SqliteCacheRepository};
use crate::http::ReqwestTransport;
use crate::runtime::{CallbackQueue, WorkerPool};
use crate::services::{AccountService, GoalService, MessageService, ServiceContext};

#[derive(Serialize)]
struct PasswordGrant<'a> {
    grant_type: &'static str,
    username: &'a str,
    password: &'a str,
    client_id: &'a str,
}

#[derive(Serialize)]
struct RevokeRequest<'a> {
    token: &'a str,
    client_id: &'a str,
}

struct Repositories {
    messages: Arc<dyn CacheRepository<Message>>,
    goals: Arc<dyn CacheRepository<Goal>>,
    accounts: Arc<dyn CacheRepository<Account>>,
}

impl Repositories {
    fn in_memory() -> Self {
        Self {
            messages: Arc::new(InMemoryCacheRepository::<Message>::new()),
            goals: Arc::new(InMemoryCacheRepository::<Goal>::new()),
            accounts: Arc::new(InMemoryCacheRepository::<Account>::new()),
        }
    }

    fn sqlite(db: &Arc<DbManager>) -> Self {
        Self {
            messages: Arc::new(SqliteCacheRepository::<Message>::new(Arc::clone(db))),
            goals: Arc::new(SqliteCacheRepository::<Goal>::new(Arc::clone(db))),
            accounts: Arc::new(SqliteCacheRepository::<Account>::new(Arc::clone(db))),
        }
    }

    async fn clear(&self) -> Result<usize> {
        let messages = self.messages.clear().await?;
        let goals = self.goals.clear().await?;
        let accounts = self.accounts.clear().await?;
        Ok(messages + goals + accounts)
    }
}

/// Builder for [`SdkSession`].
pub struct SdkSessionBuilder {
    config: SdkConfig,
    transport: Option<Arc<dyn Transport>>,
    token_store: Option<Arc<dyn TokenStore>>,
    registration: Option<Arc<dyn RegistrationCredentialSource>>,
    in_memory_cache: bool,
}

impl SdkSessionBuilder {
    pub fn new(config: SdkConfig) -> Self {
        Self { config, transport: None, token_store: None, registration: None, in_memory_cache: false }
    }

    /// Replace the reqwest transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the keychain token store.
    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Replace the seed-derived registration credential.
    #[must_use]
    pub fn with_registration_source(mut self, source: Arc<dyn RegistrationCredentialSource>) -> Self {
        self.registration = Some(source);
        self
    }

    /// Keep cached records in process memory instead of SQLite.
    #[must_use]
    pub fn with_in_memory_cache(mut self) -> Self {
        self.in_memory_cache = true;
        self
    }

    /// # Errors
    /// `SdkError::Config` for an invalid configuration, `SdkError::Storage`
    /// if the cache database cannot be opened.
    pub fn build(self) -> Result<SdkSession> {
        let config = Arc::new(validate(self.config)?);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config.http)?),
        };
        let store: Arc<dyn TokenStore> = match self.token_store {
            Some(store) => store,
            None => Arc::new(SecureTokenStore::keychain(config.keychain_service.clone())),
        };
        let registration: Option<Arc<dyn RegistrationCredentialSource>> =
            match (self.registration, &config.auth.registration_seed) {
                (Some(source), _) => Some(source),
                (None, Some(seed)) => Some(Arc::new(TimeStepRegistrationCredential::new(seed.clone())?)),
                (None, None) => None,
            };

        let refresher = Arc::new(HttpTokenRefresher::new(
            Arc::clone(&transport),
            config.url(&config.server.refresh_path),
            config.auth.client_id.clone(),
        ));
        let coordinator = TokenRefreshCoordinator::new(
            store,
            refresher,
            CoordinatorOptions {
                refresh_threshold_seconds: config.auth.refresh_threshold_seconds,
                wait_timeout: Duration::from_secs(config.auth.refresh_wait_timeout_seconds),
            },
        );
        let policy = EndpointPolicy::new()
            .with_login_path(config.server.token_path.clone())
            .with_refresh_path(config.server.refresh_path.clone())
            .with_registration_path(config.server.registration_path.clone());
        let mut interceptor = AuthInterceptor::new(transport, coordinator.clone(), policy);
        if let Some(source) = registration {
            interceptor = interceptor.with_registration_source(source);
        }

        let (db, repositories) = if self.in_memory_cache {
            (None, Repositories::in_memory())
        } else {
            let db = Arc::new(DbManager::open(&config.database)?);
            let repositories = Repositories::sqlite(&db);
            (Some(db), repositories)
        };

        let context = ServiceContext {
            config: Arc::clone(&config),
            interceptor: Arc::new(interceptor),
            reconciler: Arc::new(CacheReconciler::new()),
            workers: WorkerPool::new(config.worker.max_concurrency),
            callbacks: CallbackQueue::new(),
        };

        info!(
            base_url = %config.server.base_url,
            cache = if db.is_some() { "sqlite" } else { "memory" },
            "sdk session ready"
        );

        Ok(SdkSession {
            messages: MessageService::new(context.clone(), Arc::clone(&repositories.messages)),
            goals: GoalService::new(context.clone(), Arc::clone(&repositories.goals)),
            accounts: AccountService::new(context.clone(), Arc::clone(&repositories.accounts)),
            context,
            coordinator,
            repositories,
            db,
            auto_refresh: Mutex::new(None),
        })
    }
}

/// A host's handle on authentication, the local cache and the domain
/// services.
pub struct SdkSession {
    context: ServiceContext,
    coordinator: TokenRefreshCoordinator,
    repositories: Repositories,
    db: Option<Arc<DbManager>>,
    messages: MessageService,
    goals: GoalService,
    accounts: AccountService,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl SdkSession {
    pub fn builder(config: SdkConfig) -> SdkSessionBuilder {
        SdkSessionBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &SdkConfig {
        &self.context.config
    }

    /// Exchange a username and password for a session credential.
    ///
    /// # Errors
    /// `AuthErrorKind::InvalidCredential` when the server rejects the
    /// credentials, classified transport or storage failures otherwise.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let config = &self.context.config;
        let grant = PasswordGrant {
            grant_type: "password",
            username,
            password,
            client_id: &config.auth.client_id,
        };
        let request = HttpRequest::post(config.url(&config.server.token_path)).with_json_body(&grant)?;
        let token: TokenResponse = self.context.interceptor.execute(request).await?.json()?;

        let credential = token.into_credential(now_epoch_seconds(), None);
        self.coordinator.mark_logged_in(&credential)?;
        Ok(credential)
    }

    /// End the session: revoke the refresh token on the server when a revoke
    /// endpoint is configured, clear the stored credential and wipe the
    /// cache.
    ///
    /// A failed revoke is logged and does not keep the session alive.
    ///
    /// # Errors
    /// Storage failures while clearing the credential or the cache.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.stop_auto_refresh();
        self.revoke().await;
        self.coordinator.mark_logged_out()?;

        let removed = self.repositories.clear().await?;
        info!(removed, "cache cleared");
        self.context.reconciler.publish(CacheEvent::Cleared);
        Ok(())
    }

    async fn revoke(&self) {
        let config = &self.context.config;
        let Some(path) = &config.server.revoke_path else {
            return;
        };
        let Ok(refresh_token) = self.coordinator.refresh_token() else {
            return;
        };

        let body = RevokeRequest { token: &refresh_token, client_id: &config.auth.client_id };
        let request = match HttpRequest::post(config.url(path)).with_json_body(&body) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "could not encode revoke request");
                return;
            }
        };
        if let Err(err) = self.context.interceptor.execute(request).await {
            warn!(error = %err, "token revoke failed, clearing session anyway");
        }
    }

    /// Register a new user. The request carries the one-time registration
    /// credential, never a session token.
    ///
    /// # Errors
    /// Classified server or transport failures.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegisteredUser> {
        let config = &self.context.config;
        let request =
            HttpRequest::post(config.url(&config.server.registration_path)).with_json_body(request)?;
        self.context.interceptor.execute(request).await?.json()
    }

    /// # Errors
    /// Storage failures reading the token store.
    pub fn authentication_state(&self) -> Result<AuthenticationState> {
        self.coordinator.authentication_state()
    }

    /// Refresh now if the access token is inside the refresh window.
    ///
    /// # Errors
    /// See [`TokenRefreshCoordinator::ensure_fresh`].
    pub async fn ensure_fresh(&self) -> Result<Credential> {
        self.coordinator.ensure_fresh().await
    }

    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.coordinator.subscribe()
    }

    pub fn subscribe_cache(&self) -> broadcast::Receiver<CacheEvent> {
        self.context.reconciler.subscribe()
    }

    /// Start refreshing the access token in the background ahead of expiry.
    /// Calling it again while the loop runs has no effect.
    pub fn start_auto_refresh(&self) {
        let mut handle = self.auto_refresh.lock();
        if handle.as_ref().is_some_and(|running| !running.is_finished()) {
            return;
        }
        *handle = Some(self.coordinator.spawn_auto_refresh());
    }

    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self.auto_refresh.lock().take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_auto_refreshing(&self) -> bool {
        self.auto_refresh.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    #[must_use]
    pub fn coordinator(&self) -> &TokenRefreshCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn messages(&self) -> &MessageService {
        &self.messages
    }

    #[must_use]
    pub fn goals(&self) -> &GoalService {
        &self.goals
    }

    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    /// Queue on which background completions are delivered.
    #[must_use]
    pub fn callbacks(&self) -> &CallbackQueue {
        &self.context.callbacks
    }

    #[must_use]
    pub fn workers(&self) -> &WorkerPool {
        &self.context.workers
    }

    /// Check the cache database. Always healthy for the in-memory cache.
    ///
    /// # Errors
    /// `SdkError::Storage` if the database does not answer.
    pub fn health_check(&self) -> Result<()> {
        match &self.db {
            Some(db) => db.health_check(),
            None => Ok(()),
        }
    }
}

impl Drop for SdkSession {
    fn drop(&mut self) {
        self.stop_auto_refresh();
        self.context.workers.close();
    }
}

#[cfg(test)]
mod tests {
    use finsync_domain::SdkError;
    use tempfile::TempDir;

    use super::*;
    use crate::auth::InMemoryTokenStore;

    fn config() -> SdkConfig {
        SdkConfig::for_server("http://127.0.0.1:9")
    }

    #[tokio::test]
    async fn builds_with_sqlite_cache() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.database.path = dir.path().join("cache.db").to_string_lossy().into_owned();

        let session = SdkSession::builder(config)
            .with_token_store(Arc::new(InMemoryTokenStore::new()))
            .build()
            .unwrap();

        session.health_check().unwrap();
        assert_eq!(session.authentication_state().unwrap(), AuthenticationState::LoggedOut);
        assert!(session.messages().fetch_messages(Default::default()).await.unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = SdkSession::builder(SdkConfig::for_server("not a url"))
            .with_token_store(Arc::new(InMemoryTokenStore::new()))
            .with_in_memory_cache()
            .build();
        assert!(matches!(result, Err(SdkError::Config(_))));
    }

    #[test]
    fn rejects_empty_registration_seed() {
        let mut config = config();
        config.auth.registration_seed = Some(String::new());

        let result = SdkSession::builder(config)
            .with_token_store(Arc::new(InMemoryTokenStore::new()))
            .with_in_memory_cache()
            .build();
        assert!(matches!(result, Err(SdkError::Config(_))));
    }

    #[tokio::test]
    async fn auto_refresh_starts_once_and_stops() {
        let session = SdkSession::builder(config())
            .with_token_store(Arc::new(InMemoryTokenStore::new()))
            .with_in_memory_cache()
            .build()
            .unwrap();

        session.start_auto_refresh();
        session.start_auto_refresh();
        assert!(session.is_auto_refreshing());

        session.stop_auto_refresh();
        assert!(!session.is_auto_refreshing());
    }
}
