//! Graph validation and integrity checking.
//!
//! Audits a [`GraphState`] for structural damage (adjacency tables that
//! disagree, edges to missing nodes, cycles) and for schema drift that
//! lenient mode lets through.

use crate::graph::{GraphState, RelationshipGraph};
use nimbus_core::{Edge, ResourceId};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Types
// ============================================================================

/// Result of graph validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the graph is valid (no critical issues).
    pub valid: bool,
    /// Critical issues that should be fixed.
    pub errors: Vec<ValidationIssue>,
    /// Non-critical issues (warnings).
    pub warnings: Vec<ValidationIssue>,
    /// Informational findings.
    pub info: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
        }
    }

    /// Add an error (marks graph as invalid).
    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Add a warning.
    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Add an informational finding.
    pub fn add_info(&mut self, issue: ValidationIssue) {
        self.info.push(issue);
    }

    /// Total issue count (errors + warnings).
    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Whether any issue, at any severity, carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .chain(&self.info)
            .any(|issue| issue.code == code)
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A validation issue found in the graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue type/code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Affected node IDs (if applicable).
    pub nodes: Vec<String>,
    /// Affected edge descriptions (if applicable).
    pub edges: Vec<String>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Attach affected nodes.
    pub fn with_nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Attach affected edges.
    pub fn with_edges(mut self, edges: Vec<String>) -> Self {
        self.edges = edges;
        self
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate a graph for integrity issues.
///
/// Errors:
/// - Adjacency mismatch (forward and reverse lists disagree)
/// - Dangling edges (an endpoint is not a registered node)
/// - Self-loops
/// - Directed cycles
///
/// Warnings (only with a schema installed):
/// - Edges the schema does not allow
/// - Nodes missing a required relationship
///
/// Info:
/// - Orphan nodes (no connections)
pub fn validate_graph(graph: &GraphState) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_adjacency(graph, &mut result);
    check_dangling_edges(graph, &mut result);
    check_self_loops(graph, &mut result);
    check_cycles(graph, &mut result);
    check_schema(graph, &mut result);
    check_required(graph, &mut result);
    check_orphans(graph, &mut result);

    result
}

/// Quick check if graph has any validation errors.
pub fn is_valid(graph: &GraphState) -> bool {
    validate_graph(graph).valid
}

impl RelationshipGraph {
    /// Validates the graph under its read lock.
    pub fn validate(&self) -> ValidationResult {
        validate_graph(&self.read())
    }
}

// ============================================================================
// Individual checks
// ============================================================================

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

/// Every forward entry must have its reverse twin, and vice versa.
fn check_adjacency(graph: &GraphState, result: &mut ValidationResult) {
    let mirrored = |table: &HashMap<ResourceId, Vec<Edge>>, edge: &Edge, key: &ResourceId| {
        table.get(key).is_some_and(|list| {
            list.iter()
                .any(|e| e.same_link(&edge.from, &edge.to, edge.relationship))
        })
    };

    let mut broken = Vec::new();
    for (owner, edges) in &graph.out_edges {
        for edge in edges {
            if &edge.from != owner || !mirrored(&graph.in_edges, edge, &edge.to) {
                broken.push(format!("{edge} (forward only)"));
            }
        }
    }
    for (owner, edges) in &graph.in_edges {
        for edge in edges {
            if &edge.to != owner || !mirrored(&graph.out_edges, edge, &edge.from) {
                broken.push(format!("{edge} (reverse only)"));
            }
        }
    }

    if !broken.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "ADJACENCY_MISMATCH",
                format!("{} edge(s) are not mirrored", broken.len()),
            )
            .with_edges(sorted(broken)),
        );
    }
}

/// Check for edges whose endpoints are not registered.
fn check_dangling_edges(graph: &GraphState, result: &mut ValidationResult) {
    let dangling: Vec<String> = graph
        .out_edges
        .values()
        .chain(graph.in_edges.values())
        .flatten()
        .filter(|edge| !graph.has_node(&edge.from) || !graph.has_node(&edge.to))
        .map(ToString::to_string)
        .collect();

    if !dangling.is_empty() {
        let mut dangling = sorted(dangling);
        dangling.dedup();
        result.add_error(
            ValidationIssue::new(
                "DANGLING_EDGE",
                format!("{} edge(s) reference missing nodes", dangling.len()),
            )
            .with_edges(dangling),
        );
    }
}

/// Check for self-loops (edges from a node to itself).
fn check_self_loops(graph: &GraphState, result: &mut ValidationResult) {
    let self_loops: Vec<String> = graph
        .iter_edges()
        .filter(|edge| edge.from == edge.to)
        .map(ToString::to_string)
        .collect();

    if !self_loops.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "SELF_LOOP",
                format!("{} edge(s) are self-loops", self_loops.len()),
            )
            .with_edges(sorted(self_loops)),
        );
    }
}

/// Check for directed cycles over all relationship types.
fn check_cycles(graph: &GraphState, result: &mut ValidationResult) {
    let mut digraph: DiGraph<&ResourceId, ()> = DiGraph::new();
    let mut indices: HashMap<&ResourceId, NodeIndex> = HashMap::new();

    for node in graph.iter_nodes() {
        indices.insert(&node.id, digraph.add_node(&node.id));
    }

    for edge in graph.iter_edges() {
        if edge.from == edge.to {
            continue;
        }
        if let (Some(&from_idx), Some(&to_idx)) = (indices.get(&edge.from), indices.get(&edge.to))
        {
            digraph.add_edge(from_idx, to_idx, ());
        }
    }

    if let Err(cycle) = toposort(&digraph, None) {
        let at = digraph[cycle.node_id()].to_string();
        result.add_error(
            ValidationIssue::new("CYCLE", format!("Cycle detected through {at}"))
                .with_nodes(vec![at]),
        );
    }
}

/// Check edges against the installed schema.
fn check_schema(graph: &GraphState, result: &mut ValidationResult) {
    let Some(schema) = graph.schema() else {
        return;
    };

    let mismatched: Vec<String> = graph
        .iter_edges()
        .filter_map(|edge| {
            schema
                .validate_relationship(&edge.from, &edge.to, edge.relationship)
                .err()
                .map(|err| format!("{edge}: {err}"))
        })
        .collect();

    if !mismatched.is_empty() {
        result.add_warning(
            ValidationIssue::new(
                "SCHEMA_MISMATCH",
                format!("{} edge(s) are not allowed by the schema", mismatched.len()),
            )
            .with_edges(sorted(mismatched)),
        );
    }
}

/// Check that nodes hold every relationship the schema marks required.
fn check_required(graph: &GraphState, result: &mut ValidationResult) {
    let Some(schema) = graph.schema() else {
        return;
    };

    let mut missing = Vec::new();
    for node in graph.iter_nodes() {
        let outgoing = graph.out_edges.get(&node.id);
        for (target, entry) in schema.required_for_source(&node.id.type_key()) {
            let present = outgoing.is_some_and(|edges| {
                edges
                    .iter()
                    .any(|e| e.relationship == entry.relationship && e.to.type_key() == target)
            });
            if !present {
                missing.push(format!(
                    "{} lacks required '{}' to {target}",
                    node.id, entry.relationship
                ));
            }
        }
    }

    if !missing.is_empty() {
        result.add_warning(
            ValidationIssue::new(
                "MISSING_REQUIRED",
                format!("{} required relationship(s) missing", missing.len()),
            )
            .with_nodes(sorted(missing)),
        );
    }
}

/// Check for orphan nodes (no incoming or outgoing edges).
fn check_orphans(graph: &GraphState, result: &mut ValidationResult) {
    let orphans: Vec<String> = graph
        .iter_nodes()
        .filter(|node| {
            graph.out_edges.get(&node.id).is_none_or(Vec::is_empty)
                && graph.in_edges.get(&node.id).is_none_or(Vec::is_empty)
        })
        .map(|node| node.id.to_string())
        .collect();

    if !orphans.is_empty() {
        result.add_info(
            ValidationIssue::new(
                "ORPHAN_NODES",
                format!("{} node(s) have no connections", orphans.len()),
            )
            .with_nodes(sorted(orphans)),
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
