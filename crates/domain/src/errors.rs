//! Error types used throughout the SDK
//!
//! Every network or cache operation resolves to a success value or exactly one
//! [`SdkError`]. The first four variants are the remote taxonomy
//! (authentication, API, network, unknown); the remaining variants cover
//! failures that originate on the device.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication failure subtypes
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    #[error("no access token available")]
    MissingAccessToken,

    #[error("access token rejected by the server")]
    InvalidAccessToken,

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("refresh token rejected by the server")]
    InvalidRefreshToken,

    #[error("credentials rejected by the server")]
    InvalidCredential,

    #[error("session has been logged out")]
    LoggedOut,
}

impl AuthErrorKind {
    /// Whether this failure invalidates the whole session.
    ///
    /// A session-fatal failure during token refresh forces a logout; retrying
    /// it can never succeed without a new login.
    #[must_use]
    pub fn is_session_fatal(self) -> bool {
        matches!(
            self,
            Self::MissingRefreshToken
                | Self::InvalidRefreshToken
                | Self::InvalidCredential
                | Self::LoggedOut
        )
    }
}

/// Transport-level failure subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    ConnectionFailure,
    TlsFailure,
    Timeout,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailure => write!(f, "connection failure"),
            Self::TlsFailure => write!(f, "TLS failure"),
            Self::Timeout => write!(f, "timed out"),
        }
    }
}

/// Main error type for the SDK
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum SdkError {
    #[error("Authentication error: {0}")]
    Authentication(AuthErrorKind),

    #[error(
        "API error (HTTP {status}, code {}): {}",
        .server_code.as_deref().unwrap_or("none"),
        .message.as_deref().unwrap_or("no message")
    )]
    Api { status: u16, server_code: Option<String>, message: Option<String> },

    #[error("Network error ({kind}): {message}")]
    Network { kind: NetworkErrorKind, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SdkError {
    /// Shorthand for an authentication failure.
    #[must_use]
    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::Authentication(kind)
    }

    /// Shorthand for a network failure.
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network { kind, message: message.into() }
    }

    /// Authentication subtype, if this is an authentication failure.
    #[must_use]
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Self::Authentication(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Whether the caller may retry the operation later.
    ///
    /// Network failures, throttling and server-side errors are transient.
    /// Nothing in the SDK retries these automatically.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether this error ends the current session.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        self.auth_kind().is_some_and(AuthErrorKind::is_session_fatal)
    }

    /// Stable label suitable for structured log fields.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Api { .. } => "api",
            Self::Network { .. } => "network",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Decode(_) => "decode",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
