//! Response classification
//!
//! Turns an unsuccessful response into exactly one [`SdkError`]. A structured
//! error envelope in the body takes precedence over the HTTP status, which
//! takes precedence over anything known about the transport.

use finsync_domain::constants::{
    OAUTH_INVALID_CLIENT, OAUTH_INVALID_GRANT, SERVER_CODE_INVALID_ACCESS_TOKEN,
    SERVER_CODE_INVALID_REFRESH_TOKEN, SERVER_CODE_SUSPENDED_DEVICE, SERVER_CODE_SUSPENDED_USER,
};
use finsync_domain::{AuthErrorKind, NetworkErrorKind, SdkError};
use serde::Deserialize;

use super::ports::{HttpResponse, TransportError};
use crate::auth::policy::EndpointKind;

/// Error details carried in a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerErrorEnvelope {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvelope {
    Nested {
        error: NestedError,
    },
    OAuth {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

#[derive(Deserialize)]
struct NestedError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default, alias = "message")]
    error_message: Option<String>,
}

impl ServerErrorEnvelope {
    /// Parse either `{"error": {"error_code", "error_message"}}` or the OAuth
    /// form `{"error": "...", "error_description": "..."}`.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        match serde_json::from_slice::<RawEnvelope>(body).ok()? {
            RawEnvelope::Nested { error } => {
                Some(Self { code: error.error_code, message: error.error_message })
            }
            RawEnvelope::OAuth { error, error_description } => {
                Some(Self { code: Some(error), message: error_description })
            }
        }
    }

    /// Authentication subtype signalled by the server code, if any.
    #[must_use]
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self.code.as_deref()? {
            SERVER_CODE_INVALID_ACCESS_TOKEN => Some(AuthErrorKind::InvalidAccessToken),
            SERVER_CODE_INVALID_REFRESH_TOKEN | OAUTH_INVALID_GRANT => {
                Some(AuthErrorKind::InvalidRefreshToken)
            }
            SERVER_CODE_SUSPENDED_USER | SERVER_CODE_SUSPENDED_DEVICE | OAUTH_INVALID_CLIENT => {
                Some(AuthErrorKind::InvalidCredential)
            }
            _ => None,
        }
    }
}

/// Classify a non-success response.
#[must_use]
pub fn classify_response(response: &HttpResponse, endpoint: EndpointKind) -> SdkError {
    let envelope = ServerErrorEnvelope::parse(&response.body);

    if let Some(kind) = envelope.as_ref().and_then(ServerErrorEnvelope::auth_kind) {
        return SdkError::auth(kind);
    }

    if response.status == 401 {
        return SdkError::auth(match endpoint {
            EndpointKind::TokenRefresh => AuthErrorKind::InvalidRefreshToken,
            EndpointKind::Login | EndpointKind::Registration => AuthErrorKind::InvalidCredential,
            EndpointKind::Authenticated => AuthErrorKind::InvalidAccessToken,
        });
    }

    let (server_code, message) = match envelope {
        Some(envelope) => (envelope.code, envelope.message),
        None => (None, None),
    };
    SdkError::Api { status: response.status, server_code, message }
}

/// Classify a failure where no response was received.
#[must_use]
pub fn classify_transport_error(error: &TransportError) -> SdkError {
    match error {
        TransportError::Connection(message) => {
            SdkError::network(NetworkErrorKind::ConnectionFailure, message.clone())
        }
        TransportError::Tls(message) => SdkError::network(NetworkErrorKind::TlsFailure, message.clone()),
        TransportError::Timeout(message) => SdkError::network(NetworkErrorKind::Timeout, message.clone()),
        TransportError::Other(message) => SdkError::Unknown(message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body.as_bytes().to_vec())
    }

    #[test]
    fn envelope_code_beats_status() {
        let err = classify_response(
            &response(400, r#"{"error":{"error_code":"F0110","error_message":"expired"}}"#),
            EndpointKind::TokenRefresh,
        );
        assert_eq!(err, SdkError::auth(AuthErrorKind::InvalidRefreshToken));

        let err = classify_response(
            &response(401, r#"{"error":{"error_code":"F0111","error_message":"suspended"}}"#),
            EndpointKind::Authenticated,
        );
        assert_eq!(err, SdkError::auth(AuthErrorKind::InvalidCredential));
    }

    #[test]
    fn oauth_invalid_grant_is_invalid_refresh_token() {
        let err = classify_response(
            &response(400, r#"{"error":"invalid_grant","error_description":"revoked"}"#),
            EndpointKind::TokenRefresh,
        );
        assert_eq!(err, SdkError::auth(AuthErrorKind::InvalidRefreshToken));
    }

    #[test]
    fn bare_401_depends_on_endpoint() {
        assert_eq!(
            classify_response(&response(401, ""), EndpointKind::Authenticated),
            SdkError::auth(AuthErrorKind::InvalidAccessToken)
        );
        assert_eq!(
            classify_response(&response(401, "nope"), EndpointKind::TokenRefresh),
            SdkError::auth(AuthErrorKind::InvalidRefreshToken)
        );
    }

    #[test]
    fn unknown_codes_become_api_errors() {
        let err = classify_response(
            &response(422, r#"{"error":{"error_code":"F0400","error_message":"bad amount"}}"#),
            EndpointKind::Authenticated,
        );
        assert_eq!(
            err,
            SdkError::Api {
                status: 422,
                server_code: Some("F0400".into()),
                message: Some("bad amount".into())
            }
        );

        let err = classify_response(&response(503, "<html>down</html>"), EndpointKind::Authenticated);
        assert_eq!(err, SdkError::Api { status: 503, server_code: None, message: None });
    }

    #[test]
    fn transport_failures_map_to_network_kinds() {
        assert!(matches!(
            classify_transport_error(&TransportError::Timeout("30s".into())),
            SdkError::Network { kind: NetworkErrorKind::Timeout, .. }
        ));
        assert!(matches!(
            classify_transport_error(&TransportError::Tls("bad cert".into())),
            SdkError::Network { kind: NetworkErrorKind::TlsFailure, .. }
        ));
    }
}
