//! Refresh-grant client used by the token refresh coordinator

use std::sync::Arc;

use async_trait::async_trait;
use finsync_core::{
    classify_response, classify_transport_error, EndpointKind, HttpRequest, TokenRefresher,
    Transport,
};
use finsync_domain::{now_epoch_seconds, Credential, Result, TokenResponse};
use serde::Serialize;
use tracing::{debug, instrument, warn};

#[derive(Serialize)]
struct RefreshGrant<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

/// Exchanges a refresh token at the token endpoint.
///
/// Talks to the transport directly: the interceptor depends on the
/// coordinator, which depends on this refresher.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    refresh_url: String,
    client_id: String,
}

impl HttpTokenRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        refresh_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self { transport, refresh_url: refresh_url.into(), client_id: client_id.into() }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let grant =
            RefreshGrant { grant_type: "refresh_token", refresh_token, client_id: &self.client_id };
        let mut request = HttpRequest::post(&self.refresh_url).with_json_body(&grant)?;
        request.set_bearer(refresh_token);

        let response = self.transport.send(request).await.map_err(|err| {
            warn!(error = %err, "refresh request did not reach the server");
            classify_transport_error(&err)
        })?;

        if !response.is_success() {
            let error = classify_response(&response, EndpointKind::TokenRefresh);
            warn!(status = response.status, error = error.label(), "refresh rejected");
            return Err(error);
        }

        let tokens: TokenResponse = response.json()?;
        let credential = tokens.into_credential(now_epoch_seconds(), Some(refresh_token.to_string()));
        debug!(expiry = credential.access_token_expiry_epoch_seconds, "refresh grant accepted");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use finsync_domain::{AuthErrorKind, SdkError};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::ReqwestTransport;

    fn refresher(server: &MockServer) -> HttpTokenRefresher {
        let transport = Arc::new(ReqwestTransport::builder().build().expect("transport"));
        HttpTokenRefresher::new(transport, format!("{}/oauth/refresh", server.uri()), "sdk")
    }

    #[tokio::test]
    async fn sends_refresh_grant_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/refresh"))
            .and(header("Authorization", "Bearer r0"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": "r0",
                "client_id": "sdk"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a1",
                "refresh_token": "r1",
                "expires_in": 900
            })))
            .expect(1)
            .mount(&server)
            .await;

        let before = now_epoch_seconds();
        let credential = refresher(&server).refresh("r0").await.expect("refreshed");

        assert_eq!(credential.access_token, "a1");
        assert_eq!(credential.refresh_token(), Some("r1"));
        assert!(credential.access_token_expiry_epoch_seconds >= before + 900);
    }

    #[tokio::test]
    async fn keeps_refresh_token_when_not_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "a1", "expires_at": 42})),
            )
            .mount(&server)
            .await;

        let credential = refresher(&server).refresh("r0").await.expect("refreshed");
        assert_eq!(credential.refresh_token(), Some("r0"));
        assert_eq!(credential.access_token_expiry_epoch_seconds, 42);
    }

    #[tokio::test]
    async fn invalid_grant_is_invalid_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            })))
            .mount(&server)
            .await;

        let err = refresher(&server).refresh("r0").await.unwrap_err();
        assert_eq!(err, SdkError::auth(AuthErrorKind::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = refresher(&server).refresh("r0").await.unwrap_err();
        assert!(matches!(err, SdkError::Decode(_)));
    }
}
