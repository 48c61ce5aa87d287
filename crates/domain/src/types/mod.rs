//! Domain types shared by every finsync crate.

pub mod account;
pub mod credential;
pub mod events;
pub mod goal;
pub mod message;
pub mod record;
pub mod user;

pub use account::{Account, AccountResponse, Balance};
pub use credential::{now_epoch_seconds, AuthenticationState, Credential, TokenResponse};
pub use events::{CacheEvent, LogoutReason, SessionEvent};
pub use goal::{Goal, GoalResponse, GoalStatus, GoalUpdate};
pub use message::{Message, MessageContent, MessageResponse};
pub use record::{CacheRecord, ReconcileReport, ReconciliationScope, RecordId, ServerEntity};
pub use user::{RegisteredUser, RegistrationRequest};
