//! SQLite persistence for the local cache

pub mod cache_repository;
pub mod manager;

pub use cache_repository::SqliteCacheRepository;
pub use manager::{DbManager, SqliteConnection, SqlitePool, SCHEMA_VERSION};
