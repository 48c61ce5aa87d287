//! Port interfaces for authentication
//!
//! These traits define the boundaries between the session logic and the
//! platform: where tokens live, how a refresh reaches the server, and where
//! one-time registration credentials come from.

use async_trait::async_trait;
use finsync_domain::{Credential, Result};

/// Durable, thread-safe home of the session credential.
///
/// Calls are synchronous and short. A reader never observes a credential
/// whose fields come from two different writes.
pub trait TokenStore: Send + Sync {
    /// Current credential, or `None` when logged out.
    fn get(&self) -> Result<Option<Credential>>;

    /// Replace the stored credential.
    fn set(&self, credential: &Credential) -> Result<()>;

    /// Remove every stored field.
    fn clear(&self) -> Result<()>;
}

/// Exchanges a refresh token for a new credential.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform one refresh call.
    ///
    /// Implementations keep `refresh_token` in the returned credential when
    /// the server does not rotate it.
    ///
    /// # Errors
    /// Failures are already classified: a rejected refresh token surfaces as
    /// `AuthErrorKind::InvalidRefreshToken`, transport problems as
    /// `SdkError::Network`.
    async fn refresh(&self, refresh_token: &str) -> Result<Credential>;
}

/// Source of the one-time credential attached to registration requests.
pub trait RegistrationCredentialSource: Send + Sync {
    fn one_time_credential(&self) -> Result<String>;
}
