//! Observability: structured logging setup
//!
//! The SDK logs through `tracing` everywhere. Hosts that already install a
//! subscriber need nothing from this module; hosts that do not can call
//! [`init_tracing`] once at startup.

pub mod logging;

pub use logging::{error_label, init_from_env, init_tracing, LogFormat, DEFAULT_FILTER, LOG_ENV, LOG_JSON_ENV};
