//! Background execution and completion delivery

pub mod callback_queue;
pub mod worker_pool;

pub use callback_queue::CallbackQueue;
pub use worker_pool::{Completion, WorkerPool};
