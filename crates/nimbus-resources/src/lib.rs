//! Transactional resource management for Nimbus.
//!
//! Request handlers go through [`ResourceManager`] to create and delete
//! emulated resources. It keeps the relationship graph and the payload
//! state store consistent: a delete whose state-store step fails is rolled
//! back in the graph before the error is returned.
//!
//! # Modules
//!
//! - [`manager`]: [`ResourceManager`] and [`ResourceManagerConfig`]
//! - [`config`]: [`NimbusConfig`] loading via `confyg`

#![doc = include_str!("../README.md")]

pub mod config;
pub mod manager;

pub use config::{NimbusConfig, SchemaConfig, SchemaPreset};
pub use manager::{ResourceManager, ResourceManagerConfig};
