//! Authenticating request interceptor
//!
//! Sits between API callers and the [`Transport`]:
//! - Attaches the credential each endpoint kind requires
//! - Turns a 401 on an authenticated request into one shared refresh and a
//!   single retry
//! - Classifies every unsuccessful outcome into an [`SdkError`]

use std::sync::Arc;

use finsync_domain::{AuthErrorKind, Result, SdkError};
use tracing::{debug, instrument, warn};

use super::coordinator::TokenRefreshCoordinator;
use super::policy::{EndpointKind, EndpointPolicy};
use super::ports::RegistrationCredentialSource;
use crate::http::classification::{classify_response, classify_transport_error};
use crate::http::ports::{HttpRequest, HttpResponse, Transport};

pub struct AuthInterceptor {
    transport: Arc<dyn Transport>,
    coordinator: TokenRefreshCoordinator,
    policy: EndpointPolicy,
    registration: Option<Arc<dyn RegistrationCredentialSource>>,
}

impl AuthInterceptor {
    pub fn new(
        transport: Arc<dyn Transport>,
        coordinator: TokenRefreshCoordinator,
        policy: EndpointPolicy,
    ) -> Self {
        Self { transport, coordinator, policy, registration: None }
    }

    /// Attach a one-time credential to registration requests.
    #[must_use]
    pub fn with_registration_source(mut self, source: Arc<dyn RegistrationCredentialSource>) -> Self {
        self.registration = Some(source);
        self
    }

    #[must_use]
    pub fn coordinator(&self) -> &TokenRefreshCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn policy(&self) -> &EndpointPolicy {
        &self.policy
    }

    /// Send `request` and return the successful response.
    ///
    /// # Errors
    /// Any non-2xx response or transport failure, classified. A second 401
    /// after a refresh is `AuthErrorKind::InvalidCredential`.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path()))]
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let kind = self.policy.classify(&request.path());
        match kind {
            EndpointKind::Login => self.send_classified(request, kind).await,
            EndpointKind::Registration => {
                let mut request = request;
                if let Some(source) = &self.registration {
                    request.set_bearer(&source.one_time_credential()?);
                }
                self.send_classified(request, kind).await
            }
            EndpointKind::TokenRefresh => {
                let mut request = request;
                request.set_bearer(&self.coordinator.refresh_token()?);
                self.send_classified(request, kind).await
            }
            EndpointKind::Authenticated => self.execute_authenticated(request).await,
        }
    }

    async fn execute_authenticated(&self, request: HttpRequest) -> Result<HttpResponse> {
        let kind = EndpointKind::Authenticated;
        let token = self.coordinator.access_token()?;

        let response = self.send_with_token(&request, &token).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = classify_response(&response, kind);
        match error.auth_kind() {
            Some(AuthErrorKind::InvalidAccessToken) => {}
            Some(fatal) if fatal.is_session_fatal() => {
                self.coordinator.force_logout(fatal);
                return Err(error);
            }
            _ => return Err(error),
        }

        debug!("access token rejected, refreshing before retry");
        let refreshed = self.coordinator.refresh_after_rejection(&token).await?;

        let retry = self.send_with_token(&request, &refreshed.access_token).await?;
        if retry.is_success() {
            return Ok(retry);
        }

        let error = classify_response(&retry, kind);
        match error.auth_kind() {
            Some(fatal) if fatal.is_session_fatal() => {
                self.coordinator.force_logout(fatal);
                Err(error)
            }
            _ if retry.status == 401 => {
                warn!("request rejected again with a freshly refreshed token");
                Err(SdkError::auth(AuthErrorKind::InvalidCredential))
            }
            _ => Err(error),
        }
    }

    async fn send_with_token(&self, request: &HttpRequest, token: &str) -> Result<HttpResponse> {
        let mut request = request.clone();
        request.set_bearer(token);
        self.send(request).await
    }

    async fn send_classified(&self, request: HttpRequest, kind: EndpointKind) -> Result<HttpResponse> {
        let response = self.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify_response(&response, kind))
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await.map_err(|err| {
            warn!(error = %err, "transport failure");
            classify_transport_error(&err)
        })
    }
}
