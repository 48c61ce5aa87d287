//! Token refresh coordination
//!
//! Serializes access token refreshes across every caller in the process:
//! - At most one refresh call is on the wire at any time
//! - Callers arriving while a refresh runs join it instead of starting another
//! - A rejected refresh token ends the session (forced logout)
//! - A transient failure keeps the tokens and is returned to the caller
//! - Background task refreshing shortly before expiry
//!
//! The refresh itself runs on a detached task, so a waiter that gives up
//! (timeout, dropped future) never cancels it for everyone else.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use finsync_domain::constants::{
    AUTO_REFRESH_IDLE_RECHECK_SECS, DEFAULT_REFRESH_THRESHOLD_SECS,
    DEFAULT_REFRESH_WAIT_TIMEOUT_SECS, EVENT_CHANNEL_CAPACITY,
};
use finsync_domain::{
    now_epoch_seconds, AuthErrorKind, AuthenticationState, Credential, LogoutReason,
    NetworkErrorKind, Result, SdkError, SessionEvent,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ports::{TokenRefresher, TokenStore};

/// Published once per refresh attempt; `None` until the attempt settles.
type RefreshOutcome = Option<Result<()>>;

enum RefreshState {
    Idle,
    Refreshing(watch::Receiver<RefreshOutcome>),
}

enum Joined {
    /// The token was already replaced; no refresh needed
    Ready(Credential),
    /// Wait on the in-flight attempt
    Waiting(watch::Receiver<RefreshOutcome>),
}

/// Coordinator tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Refresh proactively when the access token expires within this window
    pub refresh_threshold_seconds: i64,
    /// Upper bound a caller waits for an in-flight refresh
    pub wait_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECS,
            wait_timeout: Duration::from_secs(DEFAULT_REFRESH_WAIT_TIMEOUT_SECS),
        }
    }
}

/// Single point of control for the session's token lifecycle.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TokenRefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    options: CoordinatorOptions,
    state: Mutex<RefreshState>,
    forced_logout: AtomicBool,
    // Bumped by login and logout; a refresh started under an older value is discarded.
    generation: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl TokenRefreshCoordinator {
    pub fn new(
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        options: CoordinatorOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                options,
                state: Mutex::new(RefreshState::Idle),
                forced_logout: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn options(&self) -> &CoordinatorOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Whether a refresh attempt is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock(), RefreshState::Refreshing(_))
    }

    /// Whether the session was ended by the server since the last login.
    #[must_use]
    pub fn is_forced_logout(&self) -> bool {
        self.inner.forced_logout.load(Ordering::SeqCst)
    }

    /// Derive the authentication state from the token store.
    ///
    /// # Errors
    /// Returns `SdkError::Storage` if the store cannot be read.
    pub fn authentication_state(&self) -> Result<AuthenticationState> {
        Ok(AuthenticationState::from_credential(self.inner.store.get()?.as_ref()))
    }

    /// Current credential with a non-empty access token.
    ///
    /// # Errors
    /// `MissingAccessToken` when logged out, `LoggedOut` after a forced logout.
    pub fn current_credential(&self) -> Result<Credential> {
        self.inner
            .store
            .get()?
            .filter(Credential::has_access_token)
            .ok_or_else(|| self.inner.missing(AuthErrorKind::MissingAccessToken))
    }

    /// Current access token.
    ///
    /// # Errors
    /// See [`TokenRefreshCoordinator::current_credential`].
    pub fn access_token(&self) -> Result<String> {
        self.current_credential().map(|credential| credential.access_token)
    }

    /// Current refresh token.
    ///
    /// # Errors
    /// `MissingRefreshToken` when none is stored, `LoggedOut` after a forced
    /// logout.
    pub fn refresh_token(&self) -> Result<String> {
        self.inner
            .store
            .get()?
            .and_then(|credential| credential.refresh_token().map(str::to_owned))
            .ok_or_else(|| self.inner.missing(AuthErrorKind::MissingRefreshToken))
    }

    /// Persist a credential obtained by login and clear the forced logout
    /// latch.
    ///
    /// # Errors
    /// Returns `SdkError::Storage` if the store rejects the write.
    pub fn mark_logged_in(&self, credential: &Credential) -> Result<()> {
        {
            let _state = self.inner.state.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            self.inner.store.set(credential)?;
            self.inner.forced_logout.store(false, Ordering::SeqCst);
        }
        info!(
            expires_at = credential.access_token_expiry_epoch_seconds,
            "session established"
        );
        self.inner.publish(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Clear the session at the host's request.
    ///
    /// # Errors
    /// Returns `SdkError::Storage` if the store cannot be cleared.
    pub fn mark_logged_out(&self) -> Result<()> {
        {
            let _state = self.inner.state.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            self.inner.store.clear()?;
        }
        info!("session ended by user");
        self.inner.publish(SessionEvent::LoggedOut { reason: LogoutReason::UserInitiated });
        Ok(())
    }

    /// End the session because the server rejected it.
    ///
    /// Requests fail with `LoggedOut` until the next successful login.
    pub fn force_logout(&self, kind: AuthErrorKind) {
        let _state = self.inner.state.lock();
        self.inner.force_logout_locked(kind);
    }

    /// Refresh the access token unconditionally, joining any in-flight
    /// attempt. Waits at most the configured timeout.
    ///
    /// # Errors
    /// `LoggedOut` when the refresh token was rejected, `SdkError::Network`
    /// on transient failures and on timeout.
    pub async fn refresh(&self) -> Result<Credential> {
        self.refresh_with_timeout(self.inner.options.wait_timeout).await
    }

    /// [`TokenRefreshCoordinator::refresh`] with an explicit wait bound.
    ///
    /// A timeout only ends this caller's wait; the attempt keeps running and
    /// its result still reaches the store.
    ///
    /// # Errors
    /// See [`TokenRefreshCoordinator::refresh`].
    pub async fn refresh_with_timeout(&self, timeout: Duration) -> Result<Credential> {
        self.join_and_wait(None, timeout).await
    }

    /// Refresh after the server rejected `rejected_access_token`.
    ///
    /// When the store already holds a different access token, another caller
    /// refreshed in the meantime and that token is returned without a network
    /// call.
    ///
    /// # Errors
    /// See [`TokenRefreshCoordinator::refresh`].
    pub async fn refresh_after_rejection(&self, rejected_access_token: &str) -> Result<Credential> {
        self.join_and_wait(Some(rejected_access_token), self.inner.options.wait_timeout).await
    }

    /// Make sure the access token stays valid for at least `seconds`,
    /// refreshing first when it does not.
    ///
    /// # Errors
    /// See [`TokenRefreshCoordinator::refresh`]; additionally
    /// `MissingAccessToken` when logged out.
    pub async fn ensure_valid_for(&self, seconds: i64) -> Result<Credential> {
        let current = self.current_credential()?;
        if !current.expires_within(seconds, now_epoch_seconds()) {
            return Ok(current);
        }
        debug!(seconds, "access token expires soon, refreshing proactively");
        self.refresh_after_rejection(&current.access_token).await
    }

    /// [`TokenRefreshCoordinator::ensure_valid_for`] with the configured
    /// threshold.
    ///
    /// # Errors
    /// See [`TokenRefreshCoordinator::ensure_valid_for`].
    pub async fn ensure_fresh(&self) -> Result<Credential> {
        self.ensure_valid_for(self.inner.options.refresh_threshold_seconds).await
    }

    /// Start the background task that refreshes shortly before expiry.
    ///
    /// Sleeps until `expiry - threshold` instead of polling. Runs until the
    /// returned handle is aborted.
    pub fn spawn_auto_refresh(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.run_auto_refresh().await })
    }

    async fn run_auto_refresh(&self) {
        let idle = Duration::from_secs(AUTO_REFRESH_IDLE_RECHECK_SECS);
        let threshold = self.inner.options.refresh_threshold_seconds;
        info!("starting token auto-refresh task");

        loop {
            let delay = self.next_refresh_delay();
            if !delay.is_zero() {
                debug!(seconds = delay.as_secs(), "auto-refresh sleeping until next check");
                tokio::time::sleep(delay).await;
            }

            let current = match self.current_credential() {
                Ok(current) => current,
                Err(_) => continue,
            };
            if !current.expires_within(threshold, now_epoch_seconds()) {
                continue;
            }

            info!("auto-refresh: access token expiring soon, refreshing");
            match self.refresh_after_rejection(&current.access_token).await {
                Ok(fresh) => {
                    // A token shorter-lived than the threshold would otherwise spin.
                    if fresh.expires_within(threshold, now_epoch_seconds()) {
                        tokio::time::sleep(idle).await;
                    }
                }
                Err(err) if err.is_session_fatal() => {
                    info!("auto-refresh: session ended");
                }
                Err(err) => {
                    error!(error = %err, "auto-refresh failed");
                    tokio::time::sleep(idle).await;
                }
            }
        }
    }

    fn next_refresh_delay(&self) -> Duration {
        match self.current_credential() {
            Ok(credential) => {
                let seconds = credential.seconds_until_expiry(now_epoch_seconds())
                    - self.inner.options.refresh_threshold_seconds;
                u64::try_from(seconds).map_or(Duration::ZERO, Duration::from_secs)
            }
            Err(_) => Duration::from_secs(AUTO_REFRESH_IDLE_RECHECK_SECS),
        }
    }

    async fn join_and_wait(&self, rejected: Option<&str>, timeout: Duration) -> Result<Credential> {
        let rx = match self.join_or_start(rejected)? {
            Joined::Ready(credential) => return Ok(credential),
            Joined::Waiting(rx) => rx,
        };

        match tokio::time::timeout(timeout, Self::wait_for_outcome(rx)).await {
            Ok(outcome) => {
                outcome?;
                self.current_credential()
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "gave up waiting for token refresh");
                Err(SdkError::network(
                    NetworkErrorKind::Timeout,
                    format!("token refresh did not complete within {}s", timeout.as_secs()),
                ))
            }
        }
    }

    async fn wait_for_outcome(mut rx: watch::Receiver<RefreshOutcome>) -> Result<()> {
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(SdkError::Unknown("token refresh task ended without a result".into()))
        })
    }

    /// `Idle -> Refreshing` happens here, under the state lock, before any
    /// network call is made.
    fn join_or_start(&self, rejected: Option<&str>) -> Result<Joined> {
        let mut state = self.inner.state.lock();

        let abandoned = match &*state {
            RefreshState::Refreshing(rx) if rx.has_changed().is_ok() => {
                debug!("joining in-flight token refresh");
                return Ok(Joined::Waiting(rx.clone()));
            }
            RefreshState::Refreshing(_) => true,
            RefreshState::Idle => false,
        };
        if abandoned {
            warn!("previous token refresh ended without settling, starting a new one");
            *state = RefreshState::Idle;
        }

        // A stored refresh token is enough; the access token may be gone.
        let current = self
            .inner
            .store
            .get()?
            .filter(|credential| {
                credential.has_access_token() || credential.refresh_token().is_some()
            })
            .ok_or_else(|| self.inner.missing(AuthErrorKind::MissingRefreshToken))?;

        if let Some(rejected) = rejected {
            if current.has_access_token() && current.access_token != rejected {
                debug!("access token already replaced, skipping refresh");
                return Ok(Joined::Ready(current));
            }
        }

        let refresh_token = current.refresh_token().map(str::to_owned);
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let (tx, rx) = watch::channel(None);
        *state = RefreshState::Refreshing(rx.clone());
        drop(state);

        let attempt = Attempt { inner: Arc::clone(&self.inner), tx: Some(tx) };
        tokio::spawn(async move {
            let result = match refresh_token {
                Some(token) => attempt.inner.call_refresher(token).await,
                None => Err(SdkError::auth(AuthErrorKind::MissingRefreshToken)),
            };
            let outcome = attempt.inner.settle(generation, result);
            attempt.finish(outcome);
        });

        Ok(Joined::Waiting(rx))
    }
}

/// Owns the sending side of one refresh attempt.
///
/// If the task is dropped before it settles (runtime shutdown, abort), the
/// state goes back to `Idle` and waiters get an error instead of hanging.
struct Attempt {
    inner: Arc<Inner>,
    tx: Option<watch::Sender<RefreshOutcome>>,
}

impl Attempt {
    fn finish(mut self, outcome: Result<()>) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome));
        }
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        warn!("token refresh task dropped before settling");
        *self.inner.state.lock() = RefreshState::Idle;
        tx.send_replace(Some(Err(SdkError::Unknown("token refresh task was cancelled".into()))));
    }
}

impl Inner {
    fn missing(&self, kind: AuthErrorKind) -> SdkError {
        if self.forced_logout.load(Ordering::SeqCst) {
            SdkError::auth(AuthErrorKind::LoggedOut)
        } else {
            SdkError::auth(kind)
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn call_refresher(&self, refresh_token: String) -> Result<Credential> {
        debug!("requesting new access token");
        let refresher = Arc::clone(&self.refresher);
        tokio::spawn(async move { refresher.refresh(&refresh_token).await })
            .await
            .unwrap_or_else(|e| Err(SdkError::Unknown(format!("token refresh task failed: {e}"))))
    }

    /// `Refreshing -> Idle` plus the attempt's effect on the store, as one
    /// step under the state lock.
    fn settle(&self, generation: u64, attempt: Result<Credential>) -> Result<()> {
        let mut state = self.state.lock();
        *state = RefreshState::Idle;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("session changed while refreshing, discarding refresh result");
            return Ok(());
        }

        match attempt {
            Ok(credential) => {
                self.store.set(&credential)?;
                info!(
                    expires_at = credential.access_token_expiry_epoch_seconds,
                    "access token refreshed"
                );
                self.publish(SessionEvent::TokenRefreshed {
                    access_token_expiry_epoch_seconds: credential.access_token_expiry_epoch_seconds,
                });
                Ok(())
            }
            Err(err) if err.is_session_fatal() => {
                let kind = err.auth_kind().unwrap_or(AuthErrorKind::InvalidRefreshToken);
                self.force_logout_locked(kind);
                Err(SdkError::auth(AuthErrorKind::LoggedOut))
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, keeping current tokens");
                Err(err)
            }
        }
    }

    fn force_logout_locked(&self, kind: AuthErrorKind) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.store.clear() {
            error!(error = %err, "failed to clear token store during forced logout");
        }
        self.forced_logout.store(true, Ordering::SeqCst);
        warn!(reason = ?kind, "session rejected by server, forcing logout");
        self.publish(SessionEvent::LoggedOut { reason: LogoutReason::RefreshRejected(kind) });
    }
}
