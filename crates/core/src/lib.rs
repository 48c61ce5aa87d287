//! # finsync Core
//!
//! Session and cache logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the token store, transport, token refresh
//!   and the record store
//! - The token refresh coordinator and the authenticating interceptor
//! - Response classification
//! - The cache reconciliation engine
//!
//! ## Architecture Principles
//! - Only depends on `finsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod auth;
pub mod http;
pub mod reconcile;

// Re-export specific items to avoid ambiguity
pub use auth::{
    AuthInterceptor, CoordinatorOptions, EndpointKind, EndpointPolicy,
    RegistrationCredentialSource, TokenRefreshCoordinator, TokenRefresher, TokenStore,
};
pub use http::{
    classify_response, classify_transport_error, HttpMethod, HttpRequest, HttpResponse,
    ServerErrorEnvelope, Transport, TransportError,
};
pub use reconcile::{CacheReconciler, CacheRepository, UpsertOutcome};
