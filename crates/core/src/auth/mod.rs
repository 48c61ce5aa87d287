//! Authentication: token ports, refresh coordination and request
//! interception

pub mod coordinator;
pub mod interceptor;
pub mod policy;
pub mod ports;

pub use coordinator::{CoordinatorOptions, TokenRefreshCoordinator};
pub use interceptor::AuthInterceptor;
pub use policy::{EndpointKind, EndpointPolicy};
pub use ports::{RegistrationCredentialSource, TokenRefresher, TokenStore};
