use finsync_domain::SdkError;
use tracing_subscriber::EnvFilter;

use crate::config::loader::env_bool;

/// Environment variable holding the SDK log filter
pub const LOG_ENV: &str = "FINSYNC_LOG";

/// Environment variable switching log output to JSON
pub const LOG_JSON_ENV: &str = "FINSYNC_LOG_JSON";

pub const DEFAULT_FILTER: &str = "info,finsync_core=info,finsync_infra=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global fmt subscriber.
///
/// `filter` takes `EnvFilter` directives; `None` falls back to `FINSYNC_LOG`,
/// then `RUST_LOG`, then [`DEFAULT_FILTER`]. Returns `false` when a global
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_tracing(filter: Option<&str>, format: LogFormat) -> bool {
    use tracing_subscriber::fmt;

    let directives = filter
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());
    let env_filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match format {
        LogFormat::Json => fmt::fmt().with_env_filter(env_filter).json().try_init(),
        LogFormat::Pretty => fmt::fmt().with_env_filter(env_filter).with_target(true).try_init(),
    };
    result.is_ok()
}

/// [`init_tracing`] with the filter and format taken from the environment.
pub fn init_from_env() -> bool {
    let format = if env_bool(LOG_JSON_ENV, false) { LogFormat::Json } else { LogFormat::Pretty };
    init_tracing(None, format)
}

/// Stable label of an error, for `error = ...` log fields and host metrics.
#[must_use]
pub fn error_label(error: &SdkError) -> &'static str {
    error.label()
}
