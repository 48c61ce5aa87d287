//! Configuration loader
//!
//! Loads SDK configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Environment variables, when `FINSYNC_BASE_URL` is set
//! 2. Otherwise a config file found by probing standard locations
//! 3. JSON and TOML are both accepted, chosen by file extension
//!
//! ## Environment Variables
//! - `FINSYNC_BASE_URL`: Backend base URL (required)
//! - `FINSYNC_CLIENT_ID`: OAuth client id
//! - `FINSYNC_REFRESH_THRESHOLD_SECS`: Proactive refresh threshold
//! - `FINSYNC_REFRESH_WAIT_TIMEOUT_SECS`: Upper bound on waiting for a refresh
//! - `FINSYNC_REGISTRATION_SEED`: Shared seed for registration credentials
//! - `FINSYNC_DB_PATH`: Cache database file path
//! - `FINSYNC_DB_POOL_SIZE`: Connection pool size
//! - `FINSYNC_HTTP_TIMEOUT_SECS`: Transport timeout
//! - `FINSYNC_HTTP_MAX_ATTEMPTS`: Transport attempts per request
//! - `FINSYNC_WORKER_CONCURRENCY`: Background worker limit
//! - `FINSYNC_KEYCHAIN_SERVICE`: Keychain service name for stored tokens
//!
//! Every variable except `FINSYNC_BASE_URL` falls back to its default.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./finsync.json` or `./finsync.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../finsync.{json,toml}` and `../../finsync.{json,toml}`
//! 4. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use finsync_domain::{Result, SdkConfig, SdkError, ServerConfig};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `SdkError::Config` if:
/// - Configuration cannot be loaded from either source
/// - An environment variable has an invalid value
/// - The file format is invalid
pub fn load() -> Result<SdkConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `SdkError::Config` if `FINSYNC_BASE_URL` is missing or any set
/// variable has an invalid value.
pub fn load_from_env() -> Result<SdkConfig> {
    let mut config = SdkConfig {
        server: ServerConfig { base_url: env_var("FINSYNC_BASE_URL")?, ..ServerConfig::default() },
        ..SdkConfig::default()
    };

    if let Some(client_id) = env_opt("FINSYNC_CLIENT_ID") {
        config.auth.client_id = client_id;
    }
    if let Some(threshold) = env_parse("FINSYNC_REFRESH_THRESHOLD_SECS")? {
        config.auth.refresh_threshold_seconds = threshold;
    }
    if let Some(timeout) = env_parse("FINSYNC_REFRESH_WAIT_TIMEOUT_SECS")? {
        config.auth.refresh_wait_timeout_seconds = timeout;
    }
    config.auth.registration_seed = env_opt("FINSYNC_REGISTRATION_SEED");

    if let Some(path) = env_opt("FINSYNC_DB_PATH") {
        config.database.path = path;
    }
    if let Some(pool_size) = env_parse("FINSYNC_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }

    if let Some(timeout) = env_parse("FINSYNC_HTTP_TIMEOUT_SECS")? {
        config.http.timeout_seconds = timeout;
    }
    if let Some(attempts) = env_parse("FINSYNC_HTTP_MAX_ATTEMPTS")? {
        config.http.max_attempts = attempts;
    }
    if let Some(concurrency) = env_parse("FINSYNC_WORKER_CONCURRENCY")? {
        config.worker.max_concurrency = concurrency;
    }
    if let Some(service) = env_opt("FINSYNC_KEYCHAIN_SERVICE") {
        config.keychain_service = service;
    }

    validate(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
///
/// # Errors
/// Returns `SdkError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<SdkConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SdkError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SdkError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SdkError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path).and_then(validate)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<SdkConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SdkError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SdkError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SdkError::Config(format!("Unsupported config format: {extension}"))),
    }
}

pub(crate) fn validate(config: SdkConfig) -> Result<SdkConfig> {
    url::Url::parse(&config.server.base_url)
        .map_err(|e| SdkError::Config(format!("Invalid base_url '{}': {e}", config.server.base_url)))?;
    if config.auth.refresh_threshold_seconds < 0 {
        return Err(SdkError::Config("refresh_threshold_seconds must not be negative".into()));
    }
    if config.worker.max_concurrency == 0 {
        return Err(SdkError::Config("worker.max_concurrency must be at least 1".into()));
    }
    Ok(config)
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["finsync.json", "finsync.toml", "config.json", "config.toml"];
    const PARENTS: [&str; 3] = ["", "..", "../.."];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| {
            PARENTS.iter().flat_map(move |parent| NAMES.iter().map(move |name| root.join(parent).join(name)))
        })
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SdkError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| raw.parse::<T>().map_err(|e| SdkError::Config(format!("Invalid {key}: {e}"))))
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
