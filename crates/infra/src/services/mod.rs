//! Domain services: network refresh into the cache, cache reads, and
//! single-record updates

pub mod accounts;
pub mod context;
pub mod goals;
pub mod messages;

pub use accounts::AccountService;
pub use context::ServiceContext;
pub use goals::GoalService;
pub use messages::{MessageFilter, MessageService};
