//! # finsync Domain
//!
//! Business domain types and models for the finsync SDK.
//!
//! This crate contains:
//! - Session credentials and authentication state
//! - Cache records, reconciliation scopes and reports
//! - The SDK error taxonomy and Result definition
//! - Configuration structures
//! - Wire and cache models for the bundled domain services
//!
//! ## Architecture
//! - No dependencies on other finsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
