//! Conversions from external infrastructure errors into SDK errors.

use std::error::Error as StdError;

use finsync_core::TransportError;
use finsync_domain::{NetworkErrorKind, SdkError};
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the SDK error.
#[derive(Debug)]
pub struct InfraError(pub SdkError);

impl From<InfraError> for SdkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SdkError> for InfraError {
    fn from(value: SdkError) -> Self {
        InfraError(value)
    }
}

trait IntoSdkError {
    fn into_sdk(self) -> SdkError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → SdkError */
/* -------------------------------------------------------------------------- */

impl IntoSdkError for SqlError {
    fn into_sdk(self) -> SdkError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => SdkError::Storage("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => SdkError::Storage("database is locked".into()),
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        SdkError::Storage("unique constraint violation".into())
                    }
                    (ErrorCode::CannotOpen, _) => {
                        SdkError::Storage(format!("unable to open database: {message}"))
                    }
                    _ => SdkError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => SdkError::Storage("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                SdkError::Decode(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                SdkError::Decode(format!("invalid column type for '{name}': {ty}"))
            }
            RE::Utf8Error(_) => SdkError::Decode("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => {
                SdkError::Storage(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => SdkError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_sdk())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → SdkError */
/* -------------------------------------------------------------------------- */

impl IntoSdkError for r2d2::Error {
    fn into_sdk(self) -> SdkError {
        SdkError::Storage(format!("connection pool: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_sdk())
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → SdkError */
/* -------------------------------------------------------------------------- */

impl IntoSdkError for KeyringError {
    fn into_sdk(self) -> SdkError {
        use KeyringError::{
            Ambiguous, BadEncoding, Invalid, NoEntry, NoStorageAccess, PlatformFailure, TooLong,
        };

        let description = self.to_string();

        match self {
            NoEntry => SdkError::Storage("keychain entry not found".into()),
            BadEncoding(_) => SdkError::Storage("credential in keychain is not valid UTF-8".into()),
            TooLong(name, limit) => SdkError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                SdkError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            Ambiguous(entries) => SdkError::Storage(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => SdkError::Storage(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                SdkError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => SdkError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_sdk())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError / SdkError */
/* -------------------------------------------------------------------------- */

/// Classify a reqwest failure that produced no response.
#[must_use]
pub fn transport_error(err: &HttpError) -> TransportError {
    let description = describe_chain(err);

    if err.is_timeout() {
        return TransportError::Timeout(description);
    }
    if looks_like_tls(&description) {
        return TransportError::Tls(description);
    }
    if err.is_connect() || err.is_request() {
        return TransportError::Connection(description);
    }
    TransportError::Other(description)
}

impl IntoSdkError for HttpError {
    fn into_sdk(self) -> SdkError {
        if self.is_builder() {
            return SdkError::Config(format!("invalid HTTP client configuration: {self}"));
        }
        if self.is_decode() {
            return SdkError::Decode(format!("invalid response body: {self}"));
        }
        match transport_error(&self) {
            TransportError::Timeout(message) => SdkError::network(NetworkErrorKind::Timeout, message),
            TransportError::Tls(message) => SdkError::network(NetworkErrorKind::TlsFailure, message),
            TransportError::Connection(message) => {
                SdkError::network(NetworkErrorKind::ConnectionFailure, message)
            }
            TransportError::Other(message) => SdkError::Unknown(message),
        }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_sdk())
    }
}

// reqwest hides the root cause behind its own message.
fn describe_chain(err: &HttpError) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}

fn looks_like_tls(description: &str) -> bool {
    let lower = description.to_ascii_lowercase();
    lower.contains("certificate") || lower.contains("tls") || lower.contains("handshake")
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
