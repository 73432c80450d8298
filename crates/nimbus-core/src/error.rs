//! Error types for Nimbus operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all Nimbus crates. Uses `thiserror` for derive macros.
//!
//! Each graph-level failure has an inspector (`is_cycle()`,
//! `is_dependency()`, ...) so request handlers can branch on the kind
//! without matching on variant fields.

use thiserror::Error;

use crate::types::{Cardinality, Edge, RelationshipType, ResourceId};

/// Errors that can occur in Nimbus operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The resource is not registered in the graph.
    #[error("resource not found: {id}")]
    NodeNotFound {
        /// The missing resource.
        id: ResourceId,
    },

    /// The resource is already registered in the graph.
    #[error("resource already exists: {id}")]
    NodeExists {
        /// The duplicate resource.
        id: ResourceId,
    },

    /// Adding the edge would close a directed cycle.
    #[error("adding {edge} would create a cycle")]
    Cycle {
        /// The rejected edge.
        edge: Box<Edge>,
    },

    /// The resource still has dependents.
    #[error("cannot delete {resource}: {} resource(s) depend on it", .dependents.len())]
    Dependency {
        /// The resource whose removal was refused.
        resource: ResourceId,
        /// Direct dependents blocking the removal.
        dependents: Vec<ResourceId>,
    },

    /// The relationship is not permitted by the schema.
    #[error("schema violation for {from} -[{relationship}]-> {to}: {reason}")]
    SchemaValidation {
        /// Dependent end.
        from: ResourceId,
        /// Dependency end.
        to: ResourceId,
        /// Requested relationship.
        relationship: RelationshipType,
        /// Why the schema rejected it.
        reason: String,
    },

    /// The relationship would exceed its cardinality.
    #[error(
        "cardinality {cardinality} violated for {from} -[{relationship}]-> {to}: conflicts with {existing}"
    )]
    Cardinality {
        /// Dependent end.
        from: ResourceId,
        /// Dependency end.
        to: ResourceId,
        /// Requested relationship.
        relationship: RelationshipType,
        /// The constraint that was violated.
        cardinality: Cardinality,
        /// The resource on the far end of the conflicting existing edge.
        existing: ResourceId,
    },

    /// The state store rejected an operation.
    #[error("state store error for key '{key}': {message}")]
    StateStore {
        /// Key being operated on.
        key: String,
        /// Store-provided detail.
        message: String,
    },

    /// No value is stored under the key.
    #[error("state key not found: {0}")]
    KeyNotFound(String),

    /// Deleting resource data failed and the graph was restored.
    #[error("failed to delete resource data for {resource}: {source}; graph restored")]
    RollbackCompleted {
        /// The resource whose deletion was rolled back.
        resource: ResourceId,
        /// The state-store failure that triggered the rollback.
        #[source]
        source: Box<Error>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Create a node-not-found error.
    pub fn node_not_found(id: &ResourceId) -> Self {
        Self::NodeNotFound { id: id.clone() }
    }

    /// Create a node-exists error.
    pub fn node_exists(id: &ResourceId) -> Self {
        Self::NodeExists { id: id.clone() }
    }

    /// Create a cycle error for the rejected edge.
    pub fn cycle(edge: &Edge) -> Self {
        Self::Cycle {
            edge: Box::new(edge.clone()),
        }
    }

    /// Create a state store error.
    pub fn state_store(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StateStore {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// The underlying failure, looking through a completed rollback.
    fn root(&self) -> &Error {
        match self {
            Self::RollbackCompleted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the resource was not registered.
    pub fn is_node_not_found(&self) -> bool {
        matches!(self.root(), Self::NodeNotFound { .. })
    }

    /// Whether the resource was already registered.
    pub fn is_node_exists(&self) -> bool {
        matches!(self.root(), Self::NodeExists { .. })
    }

    /// Whether an edge was rejected for closing a cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self.root(), Self::Cycle { .. })
    }

    /// Whether a removal was blocked by dependents.
    pub fn is_dependency(&self) -> bool {
        matches!(self.root(), Self::Dependency { .. })
    }

    /// Whether the schema rejected a relationship.
    pub fn is_schema_validation(&self) -> bool {
        matches!(self.root(), Self::SchemaValidation { .. })
    }

    /// Whether a cardinality constraint was violated.
    pub fn is_cardinality(&self) -> bool {
        matches!(self.root(), Self::Cardinality { .. })
    }

    /// Whether the state store failed.
    pub fn is_state_store(&self) -> bool {
        matches!(self.root(), Self::StateStore { .. } | Self::KeyNotFound(_))
    }

    /// Whether a failed delete was rolled back.
    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::RollbackCompleted { .. })
    }

    /// Dependents blocking a removal, if this is a dependency error.
    pub fn dependents(&self) -> Option<&[ResourceId]> {
        match self.root() {
            Self::Dependency { dependents, .. } => Some(dependents.as_slice()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type alias using Nimbus's Error type.
pub type Result<T> = std::result::Result<T, Error>;
