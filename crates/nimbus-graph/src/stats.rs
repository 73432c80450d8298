//! Graph statistics and analysis.
//!
//! Provides functions for analysing graph composition: resource types,
//! relationship kinds, degree distribution and top-node rankings.

use crate::graph::{GraphState, RelationshipGraph};
use nimbus_core::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Types
// ============================================================================

/// Comprehensive statistics about a graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of nodes.
    pub node_count: usize,
    /// Total number of edges.
    pub edge_count: usize,
    /// Nodes per `service:type` key.
    pub type_distribution: BTreeMap<String, usize>,
    /// Edges per relationship type.
    pub relationship_distribution: BTreeMap<String, usize>,
    /// Nodes without any edges (orphans).
    pub orphan_count: usize,
    /// Average edges per node (in + out).
    pub avg_degree: f32,
    /// Maximum in-degree (most dependents).
    pub max_in_degree: usize,
    /// Maximum out-degree (most dependencies).
    pub max_out_degree: usize,
    /// Node with highest in-degree.
    pub most_depended_on: Option<ResourceId>,
    /// Node with highest out-degree.
    pub most_dependencies: Option<ResourceId>,
}

/// Direction for degree calculation.
#[derive(Clone, Copy, Debug)]
pub enum DegreeDirection {
    /// Incoming edges only.
    In,
    /// Outgoing edges only.
    Out,
    /// Both directions.
    Both,
}

// ============================================================================
// Functions
// ============================================================================

fn degree(graph: &GraphState, id: &ResourceId, direction: DegreeDirection) -> usize {
    let incoming = || graph.in_edges.get(id).map_or(0, Vec::len);
    let outgoing = || graph.out_edges.get(id).map_or(0, Vec::len);
    match direction {
        DegreeDirection::In => incoming(),
        DegreeDirection::Out => outgoing(),
        DegreeDirection::Both => incoming() + outgoing(),
    }
}

/// Highest-degree node; ties go to the smallest ID.
fn busiest(graph: &GraphState, direction: DegreeDirection) -> (Option<ResourceId>, usize) {
    graph
        .iter_nodes()
        .map(|node| (&node.id, degree(graph, &node.id, direction)))
        .filter(|(_, d)| *d > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(id, d)| (Some(id.clone()), d))
        .unwrap_or((None, 0))
}

/// Compute comprehensive statistics for a graph.
pub fn compute_stats(graph: &GraphState) -> GraphStats {
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    let mut type_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for node in graph.iter_nodes() {
        *type_distribution.entry(node.id.type_key()).or_insert(0) += 1;
    }

    let mut relationship_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for edge in graph.iter_edges() {
        *relationship_distribution
            .entry(edge.relationship.name().to_string())
            .or_insert(0) += 1;
    }

    let orphan_count = graph
        .iter_nodes()
        .filter(|node| degree(graph, &node.id, DegreeDirection::Both) == 0)
        .count();

    let avg_degree = if node_count > 0 {
        (2 * edge_count) as f32 / node_count as f32
    } else {
        0.0
    };

    let (most_depended_on, max_in_degree) = busiest(graph, DegreeDirection::In);
    let (most_dependencies, max_out_degree) = busiest(graph, DegreeDirection::Out);

    GraphStats {
        node_count,
        edge_count,
        type_distribution,
        relationship_distribution,
        orphan_count,
        avg_degree,
        max_in_degree,
        max_out_degree,
        most_depended_on,
        most_dependencies,
    }
}

/// Get a quick summary of graph size.
pub fn quick_summary(graph: &GraphState) -> String {
    format!("{} nodes, {} edges", graph.node_count(), graph.edge_count())
}

/// Get top N nodes by degree, highest first; ties ordered by ID.
pub fn top_nodes_by_degree(
    graph: &GraphState,
    limit: usize,
    direction: DegreeDirection,
) -> Vec<(ResourceId, usize)> {
    let mut scores: Vec<(ResourceId, usize)> = graph
        .iter_nodes()
        .map(|node| (node.id.clone(), degree(graph, &node.id, direction)))
        .collect();

    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scores.truncate(limit);
    scores
}

impl RelationshipGraph {
    /// Computes statistics under the read lock.
    pub fn stats(&self) -> GraphStats {
        compute_stats(&self.read())
    }
}

// ============================================================================
// Tests
// ============================================================================
