//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{transport_error, InfraError};

/// Map a `spawn_blocking` join failure into a storage error.
pub(crate) fn map_join_error(err: tokio::task::JoinError) -> finsync_domain::SdkError {
    finsync_domain::SdkError::Storage(format!("blocking task failed: {err}"))
}
