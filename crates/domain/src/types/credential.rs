//! Session credential types
//!
//! A [`Credential`] is owned by the secure token store. Everything else only
//! borrows a copy for the duration of a single request or refresh.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Access/refresh token pair with the access token's absolute expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived bearer token authorizing API calls
    pub access_token: String,

    /// Long-lived token used to obtain a new access token; may rotate on use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token expiry as seconds since the Unix epoch
    pub access_token_expiry_epoch_seconds: i64,
}

impl Credential {
    /// Create a new credential.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        access_token_expiry_epoch_seconds: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            access_token_expiry_epoch_seconds,
        }
    }

    /// Whether the access token expires within `seconds` of `now`.
    ///
    /// An already expired token always returns `true`.
    #[must_use]
    pub fn expires_within(&self, seconds: i64, now: i64) -> bool {
        now.saturating_add(seconds) >= self.access_token_expiry_epoch_seconds
    }

    /// Whether the access token is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_within(0, now)
    }

    /// Seconds until the access token expires (negative when expired).
    #[must_use]
    pub fn seconds_until_expiry(&self, now: i64) -> i64 {
        self.access_token_expiry_epoch_seconds.saturating_sub(now)
    }

    /// Whether the credential carries a usable access token.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Refresh token, if present and non-empty.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|token| !token.is_empty())
    }
}

// Tokens never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("access_token_expiry_epoch_seconds", &self.access_token_expiry_epoch_seconds)
            .finish()
    }
}

/// Whether a session is currently established.
///
/// Derived from the token store on every call, never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationState {
    LoggedOut,
    LoggedIn,
}

impl AuthenticationState {
    /// Derive the state from whatever the token store currently holds.
    #[must_use]
    pub fn from_credential(credential: Option<&Credential>) -> Self {
        match credential {
            Some(credential) if credential.has_access_token() => Self::LoggedIn,
            _ => Self::LoggedOut,
        }
    }
}

/// Token endpoint response
///
/// Accepts both a relative `expires_in` and an absolute `expires_at`; the
/// absolute value wins when both are present.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenResponse {
    /// Convert into a credential.
    ///
    /// When the server did not rotate the refresh token, `previous_refresh`
    /// is carried over so the session stays refreshable.
    #[must_use]
    pub fn into_credential(self, now: i64, previous_refresh: Option<String>) -> Credential {
        let expiry = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(seconds)) => now.saturating_add(seconds),
            (None, None) => now,
        };
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty()).or(previous_refresh);
        Credential::new(self.access_token, refresh_token, expiry)
    }
}

/// Current wall-clock time as seconds since the Unix epoch.
#[must_use]
pub fn now_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}
