//! SDK configuration

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_POOL_SIZE, DEFAULT_HTTP_MAX_ATTEMPTS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_REFRESH_WAIT_TIMEOUT_SECS, DEFAULT_WORKER_CONCURRENCY,
};

/// SDK configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
}

/// Backend location and endpoint paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,

    /// Token endpoint used for the password login grant
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Token endpoint used for the refresh grant
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Optional revoke endpoint called on logout
    #[serde(default)]
    pub revoke_path: Option<String>,

    #[serde(default = "default_registration_path")]
    pub registration_path: String,

    #[serde(default)]
    pub endpoints: EndpointPaths,
}

/// Resource paths of the bundled domain services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPaths {
    pub accounts: String,
    pub goals: String,
    pub messages: String,
}

/// Token lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub refresh_threshold_seconds: i64,
    pub refresh_wait_timeout_seconds: u64,
    #[serde(skip_serializing)]
    pub registration_seed: Option<String>,
}

/// Local cache database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub max_attempts: usize,
    pub user_agent: String,
}

/// Background worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub max_concurrency: usize,
}

fn default_keychain_service() -> String {
    "finsync".to_string()
}

fn default_token_path() -> String {
    "/oauth/token".to_string()
}

fn default_refresh_path() -> String {
    "/oauth/refresh".to_string()
}

fn default_registration_path() -> String {
    "/users/register".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_path: default_token_path(),
            refresh_path: default_refresh_path(),
            revoke_path: None,
            registration_path: default_registration_path(),
            endpoints: EndpointPaths::default(),
        }
    }
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            accounts: "/accounts".to_string(),
            goals: "/goals".to_string(),
            messages: "/messages".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: "finsync-sdk".to_string(),
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECS,
            refresh_wait_timeout_seconds: DEFAULT_REFRESH_WAIT_TIMEOUT_SECS,
            registration_seed: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "finsync.db".to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECS,
            max_attempts: DEFAULT_HTTP_MAX_ATTEMPTS,
            user_agent: concat!("finsync-sdk/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_concurrency: DEFAULT_WORKER_CONCURRENCY }
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            http: HttpConfig::default(),
            worker: WorkerConfig::default(),
            keychain_service: default_keychain_service(),
        }
    }
}

impl SdkConfig {
    /// Configuration pointing at `base_url` with every other value defaulted.
    pub fn for_server(base_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig { base_url: base_url.into(), ..ServerConfig::default() },
            ..Self::default()
        }
    }

    /// Absolute URL for a server path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_fills_defaults() {
        let config: SdkConfig =
            serde_json::from_str(r#"{"server":{"base_url":"https://api.example.com"}}"#).unwrap();
        assert_eq!(config.server.token_path, "/oauth/token");
        assert_eq!(config.auth.refresh_threshold_seconds, DEFAULT_REFRESH_THRESHOLD_SECS);
        assert_eq!(config.worker.max_concurrency, DEFAULT_WORKER_CONCURRENCY);
        assert_eq!(config.keychain_service, "finsync");
        assert_eq!(config.url("/messages"), "https://api.example.com/messages");
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config: SdkConfig = toml::from_str(
            r#"
keychain_service = "com.example.app"

[server]
base_url = "https://api.example.com/"
revoke_path = "/oauth/revoke"

[auth]
client_id = "mobile"
refresh_threshold_seconds = 120

[database]
path = "cache.db"
"#,
        )
        .unwrap();
        assert_eq!(config.server.revoke_path.as_deref(), Some("/oauth/revoke"));
        assert_eq!(config.auth.client_id, "mobile");
        assert_eq!(config.auth.refresh_threshold_seconds, 120);
        assert_eq!(config.database.path, "cache.db");
        assert_eq!(config.database.pool_size, DEFAULT_DB_POOL_SIZE);
        assert_eq!(config.url("/goals"), "https://api.example.com/goals");
    }

    #[test]
    fn registration_seed_is_never_serialized() {
        let mut config = SdkConfig::for_server("https://api.example.com");
        config.auth.registration_seed = Some("seed".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("seed"));
    }
}
