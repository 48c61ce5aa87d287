//! Shared fixtures for the infra integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use finsync_core::{RegistrationCredentialSource, TokenStore};
use finsync_domain::{now_epoch_seconds, Credential, Result, SdkConfig};
use finsync_infra::{InMemoryTokenStore, ReqwestTransport, SdkSession};
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

pub const REVOKE_PATH: &str = "/oauth/revoke";

/// Configuration pointing every endpoint at the mock server.
pub fn config_for(server: &MockServer) -> SdkConfig {
    let mut config = SdkConfig::for_server(server.uri());
    config.server.revoke_path = Some(REVOKE_PATH.to_string());
    config.auth.client_id = "test-client".to_string();
    config.auth.refresh_wait_timeout_seconds = 5;
    config
}

/// Credential whose access token expires `expires_in` seconds from now.
pub fn credential(access: &str, refresh: &str, expires_in: i64) -> Credential {
    Credential::new(access, Some(refresh.to_string()), now_epoch_seconds() + expires_in)
}

pub struct TestSession {
    pub session: SdkSession,
    pub store: Arc<InMemoryTokenStore>,
}

impl TestSession {
    pub fn stored(&self) -> Option<Credential> {
        self.store.get().expect("in-memory store never fails")
    }
}

fn transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::builder().build().expect("transport"))
}

/// Session with an in-memory cache, logged in with `credential` if given.
pub fn memory_session(server: &MockServer, credential: Option<Credential>) -> TestSession {
    session_with(config_for(server), credential, true)
}

/// Session with a SQLite cache in `dir`.
pub fn sqlite_session(server: &MockServer, dir: &Path, credential: Option<Credential>) -> TestSession {
    let mut config = config_for(server);
    config.database.path = dir.join("cache.db").to_string_lossy().into_owned();
    session_with(config, credential, false)
}

pub fn session_with(config: SdkConfig, credential: Option<Credential>, in_memory: bool) -> TestSession {
    let store = Arc::new(match credential {
        Some(credential) => InMemoryTokenStore::with_credential(credential),
        None => InMemoryTokenStore::new(),
    });
    let mut builder = SdkSession::builder(config)
        .with_transport(transport())
        .with_token_store(Arc::clone(&store) as Arc<dyn TokenStore>)
        .with_registration_source(Arc::new(FixedRegistrationCredential));
    if in_memory {
        builder = builder.with_in_memory_cache();
    }
    TestSession { session: builder.build().expect("session"), store }
}

/// Registration credential that never changes.
pub struct FixedRegistrationCredential;

pub const REGISTRATION_CREDENTIAL: &str = "one-time-credential";

impl RegistrationCredentialSource for FixedRegistrationCredential {
    fn one_time_credential(&self) -> Result<String> {
        Ok(REGISTRATION_CREDENTIAL.to_string())
    }
}

pub fn token_body(access: &str, refresh: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": expires_in,
    })
}

/// 401 carrying the invalid access token server code.
pub fn access_token_rejected() -> ResponseTemplate {
    ResponseTemplate::new(401)
        .set_body_json(json!({"error": {"error_code": "F0101", "error_message": "token expired"}}))
}

pub fn invalid_grant() -> ResponseTemplate {
    ResponseTemplate::new(400)
        .set_body_json(json!({"error": "invalid_grant", "error_description": "refresh token revoked"}))
}

pub fn text_message(id: i64, read: bool) -> Value {
    json!({
        "id": id,
        "title": format!("Message {id}"),
        "content_type": "text",
        "content": {"body": "hello"},
        "read": read,
    })
}

pub fn goal(id: i64, account_id: i64) -> Value {
    json!({
        "id": id,
        "account_id": account_id,
        "name": format!("Goal {id}"),
        "target_amount": 1000.0,
        "current_amount": 250.0,
        "status": "active",
    })
}

pub fn account(id: i64) -> Value {
    json!({
        "id": id,
        "account_name": format!("Account {id}"),
        "account_type": "checking",
        "current_balance": {"amount": 42.5, "currency": "EUR"},
    })
}
