//! Nimbus Core — identity types, errors, and the state-store boundary.
//!
//! This crate provides the foundational types used across all Nimbus crates.
//! It has no internal Nimbus dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`types`]: Resource identity, relationship kinds, nodes and edges
//! - [`traits`]: The [`StateStore`] abstraction
//! - [`store`]: In-memory [`StateStore`] implementation

#![doc = include_str!("../README.md")]

pub mod error;
pub mod store;
pub mod traits;
pub mod types;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use store::MemoryStateStore;
pub use traits::{StateStore, StateStoreExt};
pub use types::{Cardinality, DeleteBehavior, Edge, Node, RelationshipType, ResourceId};
