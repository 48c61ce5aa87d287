//! SDK constants
//!
//! Centralized location for storage keys, server error codes and defaults
//! used throughout the SDK.

// Secure token store keys
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const ACCESS_TOKEN_EXPIRY_KEY: &str = "access_token_expiry";

// Server error codes carried in the response error envelope
pub const SERVER_CODE_INVALID_ACCESS_TOKEN: &str = "F0101";
pub const SERVER_CODE_INVALID_REFRESH_TOKEN: &str = "F0110";
pub const SERVER_CODE_SUSPENDED_USER: &str = "F0111";
pub const SERVER_CODE_SUSPENDED_DEVICE: &str = "F0112";

// OAuth error codes (RFC 6749 §5.2)
pub const OAUTH_INVALID_GRANT: &str = "invalid_grant";
pub const OAUTH_INVALID_CLIENT: &str = "invalid_client";

// Token lifecycle defaults
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;
pub const DEFAULT_REFRESH_WAIT_TIMEOUT_SECS: u64 = 60;
pub const AUTO_REFRESH_IDLE_RECHECK_SECS: u64 = 60;
pub const REGISTRATION_TIME_STEP_SECS: u64 = 30;

// Transport and worker defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_MAX_ATTEMPTS: usize = 1;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// Entity kinds used as reconciliation scope roots
pub const ENTITY_MESSAGE: &str = "message";
pub const ENTITY_GOAL: &str = "goal";
pub const ENTITY_ACCOUNT: &str = "account";

// Message categories
pub const CATEGORY_UNREAD: &str = "unread";
pub const CATEGORY_READ: &str = "read";
