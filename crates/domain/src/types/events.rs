//! Events published to SDK observers

use serde::{Deserialize, Serialize};

use super::record::{ReconcileReport, RecordId};
use crate::errors::AuthErrorKind;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutReason {
    /// The host asked for a logout
    UserInitiated,
    /// The server rejected the refresh token or credentials
    RefreshRejected(AuthErrorKind),
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    LoggedIn,
    TokenRefreshed { access_token_expiry_epoch_seconds: i64 },
    LoggedOut { reason: LogoutReason },
}

/// Local store change notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// A scope was reconciled against a server response
    Reconciled(ReconcileReport),
    /// A single record was written outside reconciliation
    Updated { entity: String, id: RecordId },
    /// The whole cache was wiped (logout)
    Cleared,
}
