//! Common types shared across certsteward crates
//!
//! # Module Organization
//!
//! - [`ids`]: Type-safe identifier newtypes (DomainGroup, StoreKey)

pub mod ids;

// Re-export identifier types
pub use ids::{DomainGroup, DomainGroupError, StoreKey};
