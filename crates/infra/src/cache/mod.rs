//! Cache repositories that need no database

pub mod memory;

pub use memory::InMemoryCacheRepository;
