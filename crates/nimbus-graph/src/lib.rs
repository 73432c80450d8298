//! Relationship graph infrastructure for Nimbus.
//!
//! This crate tracks dependencies between emulated cloud resources and
//! enforces referential integrity on them.
//!
//! # Key Abstractions
//!
//! - [`RelationshipGraph`]: lock-protected adjacency lists; [`GraphState`]
//!   is the unlocked view used for multi-step atomic work
//! - [`RelationshipSchema`]: allowed relationships per type pair
//! - [`Removal`]: undo record for a node removal, replayed by
//!   [`GraphState::restore`]

#![doc = include_str!("../README.md")]

pub mod aws;
pub mod graph;
pub mod query;
pub mod schema;
pub mod stats;
pub mod validation;

pub use aws::aws_relationship_schema;
pub use graph::{GraphConfig, GraphState, RelationshipGraph, Removal, SchemaWarning};
pub use query::{DeleteImpact, EdgeInfo, NeighborhoodResponse, NodeSummary};
pub use schema::{RelationshipSchema, SchemaEntry};
pub use stats::{DegreeDirection, GraphStats, compute_stats, quick_summary, top_nodes_by_degree};
pub use validation::{ValidationIssue, ValidationResult, is_valid, validate_graph};
