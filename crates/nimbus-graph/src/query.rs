//! Query response types for graph operations.
//!
//! Structured, serializable views of the graph for introspection
//! endpoints and debugging output.

use crate::graph::{GraphState, RelationshipGraph};
use chrono::{DateTime, Utc};
use nimbus_core::{DeleteBehavior, Edge, Error, Node, ResourceId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Node / Edge summaries
// ============================================================================

/// Summary information about a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Canonical `service:type:id` string.
    pub id: String,
    /// `service:type` key.
    pub type_key: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Node metadata, sorted by key.
    pub metadata: BTreeMap<String, String>,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            type_key: node.id.type_key(),
            created_at: node.created_at,
            metadata: node
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Summary information about an edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Dependent end.
    pub from: String,
    /// Dependency end.
    pub to: String,
    /// Relationship type.
    pub relationship: String,
}

impl From<&Edge> for EdgeInfo {
    fn from(edge: &Edge) -> Self {
        Self {
            from: edge.from.to_string(),
            to: edge.to.to_string(),
            relationship: edge.relationship.name().to_string(),
        }
    }
}

// ============================================================================
// Neighborhood
// ============================================================================

/// One-hop view of a node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NeighborhoodResponse {
    /// The node itself.
    pub node: NodeSummary,
    /// Edges starting at the node.
    pub dependencies: Vec<EdgeInfo>,
    /// Edges ending at the node.
    pub dependents: Vec<EdgeInfo>,
}

// ============================================================================
// Delete impact
// ============================================================================

/// What deleting a node would touch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteImpact {
    /// The node being considered.
    pub target: ResourceId,
    /// Distinct direct dependents; these block a restrict delete.
    pub blocked_by: Vec<ResourceId>,
    /// Every node a cascade delete removes, target included, dependents first.
    pub cascade: Vec<ResourceId>,
    /// Whether a restrict delete would succeed.
    pub restrict_ok: bool,
}

impl GraphState {
    /// One-hop view of `id`.
    pub fn neighborhood(&self, id: &ResourceId) -> Result<NeighborhoodResponse> {
        let node = self
            .get_node(id)
            .ok_or_else(|| Error::node_not_found(id))?;
        Ok(NeighborhoodResponse {
            node: NodeSummary::from(node),
            dependencies: self.get_dependencies(id)?.iter().map(EdgeInfo::from).collect(),
            dependents: self.get_dependents(id)?.iter().map(EdgeInfo::from).collect(),
        })
    }

    /// Reports the effect of deleting `id` without changing anything.
    pub fn impact(&self, id: &ResourceId) -> Result<DeleteImpact> {
        let (restrict_ok, blocked_by) = self.can_delete(id)?;
        let mut cascade = Vec::new();
        self.cascade_order(id, &mut HashSet::new(), &mut cascade);
        Ok(DeleteImpact {
            target: id.clone(),
            blocked_by,
            cascade,
            restrict_ok,
        })
    }

    /// Whether deleting `id` with `behavior` would succeed.
    pub fn would_delete(&self, id: &ResourceId, behavior: DeleteBehavior) -> Result<bool> {
        let (restrict_ok, _) = self.can_delete(id)?;
        Ok(behavior != DeleteBehavior::Restrict || restrict_ok)
    }
}

impl RelationshipGraph {
    /// See [`GraphState::neighborhood`].
    pub fn neighborhood(&self, id: &ResourceId) -> Result<NeighborhoodResponse> {
        self.read().neighborhood(id)
    }

    /// See [`GraphState::impact`].
    pub fn impact(&self, id: &ResourceId) -> Result<DeleteImpact> {
        self.read().impact(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
