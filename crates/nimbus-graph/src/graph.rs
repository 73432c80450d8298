//! The relationship graph.
//!
//! [`RelationshipGraph`] is an adjacency-list directed graph over
//! [`ResourceId`]s. Every node has a forward (`out`) and reverse (`in`)
//! edge list; the two are kept as mirror images. All tables, the active
//! [`GraphConfig`] and the optional [`RelationshipSchema`] sit behind one
//! reader/writer lock.
//!
//! Callers that need several steps to be atomic take the lock once with
//! [`RelationshipGraph::write`] and drive the returned [`GraphState`]
//! directly; its methods never lock.
//!
//! # Example
//!
//! ```rust
//! use nimbus_core::{DeleteBehavior, Edge, RelationshipType, ResourceId};
//! use nimbus_graph::RelationshipGraph;
//! use std::collections::HashMap;
//!
//! let graph = RelationshipGraph::new();
//! let vpc = ResourceId::new("ec2", "vpc", "vpc-1");
//! let subnet = ResourceId::new("ec2", "subnet", "subnet-1");
//!
//! graph.add_node(vpc.clone(), HashMap::new()).unwrap();
//! graph.add_node(subnet.clone(), HashMap::new()).unwrap();
//! graph
//!     .add_edge(Edge::new(subnet.clone(), vpc.clone(), RelationshipType::Contains))
//!     .unwrap();
//!
//! let err = graph.remove_node(&vpc, DeleteBehavior::Restrict).unwrap_err();
//! assert!(err.is_dependency());
//!
//! graph.remove_node(&vpc, DeleteBehavior::Cascade).unwrap();
//! assert_eq!(graph.node_count(), 0);
//! ```

use crate::schema::RelationshipSchema;
use nimbus_core::{DeleteBehavior, Edge, Error, Node, RelationshipType, ResourceId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Configuration
// ============================================================================

/// Behavior switches for a [`RelationshipGraph`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Fail (rather than warn) when an edge violates the schema.
    pub strict_validation: bool,
    /// Behavior used when a caller does not pick one.
    pub default_delete_behavior: DeleteBehavior,
    /// Reject edges that would close a directed cycle.
    pub detect_cycles: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            default_delete_behavior: DeleteBehavior::Restrict,
            detect_cycles: true,
        }
    }
}

/// A schema violation admitted under lenient validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaWarning {
    /// The edge that was added despite the violation.
    pub edge: Edge,
    /// The suppressed error's message.
    pub message: String,
}

// ============================================================================
// Removal record
// ============================================================================

#[derive(Clone, Debug)]
enum UndoStep {
    /// A node and its own adjacency lists were dropped.
    Node {
        node: Node,
        outgoing: Vec<Edge>,
        incoming: Vec<Edge>,
    },
    /// An edge was taken out of `in_edges[target]` at `index`.
    InEntry {
        target: ResourceId,
        index: usize,
        edge: Edge,
    },
    /// An edge was taken out of `out_edges[source]` at `index`.
    OutEntry {
        source: ResourceId,
        index: usize,
        edge: Edge,
    },
}

/// Everything a node removal took out of the graph.
///
/// Passing it back to [`GraphState::restore`] puts the graph back exactly
/// as it was, adjacency order included.
#[derive(Clone, Debug, Default)]
pub struct Removal {
    steps: Vec<UndoStep>,
}

impl Removal {
    /// Removed nodes, dependents first.
    pub fn nodes(&self) -> Vec<ResourceId> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                UndoStep::Node { node, .. } => Some(node.id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Removed edges, each reported once.
    pub fn edges(&self) -> Vec<Edge> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                UndoStep::Node { outgoing, .. } => outgoing.clone(),
                UndoStep::OutEntry { edge, .. } => vec![edge.clone()],
                UndoStep::InEntry { .. } => Vec::new(),
            })
            .collect()
    }

    /// Whether nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ============================================================================
// GraphState
// ============================================================================

/// The lock-protected contents of a [`RelationshipGraph`].
///
/// Obtained through [`RelationshipGraph::read`] / [`RelationshipGraph::write`].
#[derive(Debug, Default)]
pub struct GraphState {
    pub(crate) nodes: HashMap<ResourceId, Node>,
    pub(crate) out_edges: HashMap<ResourceId, Vec<Edge>>,
    pub(crate) in_edges: HashMap<ResourceId, Vec<Edge>>,
    config: GraphConfig,
    schema: Option<Arc<RelationshipSchema>>,
    warnings: Vec<SchemaWarning>,
}

impl GraphState {
    /// Creates an empty state with the given configuration.
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------------
    // Config / schema
    // ------------------------------------------------------------------------

    /// Active configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Replaces the configuration for all subsequent operations.
    pub fn set_config(&mut self, config: GraphConfig) {
        log::info!(
            "graph config: strict={} detect_cycles={} delete={}",
            config.strict_validation,
            config.detect_cycles,
            config.default_delete_behavior
        );
        self.config = config;
    }

    /// Active schema, if any.
    pub fn schema(&self) -> Option<Arc<RelationshipSchema>> {
        self.schema.clone()
    }

    /// Installs a schema, or removes it with `None`.
    pub fn set_schema(&mut self, schema: Option<Arc<RelationshipSchema>>) {
        match &schema {
            Some(s) => log::info!("graph schema set ({} relationships)", s.len()),
            None => log::info!("graph schema cleared"),
        }
        self.schema = schema;
    }

    /// Warnings recorded under lenient validation, oldest first.
    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    /// Drains the recorded warnings.
    pub fn take_warnings(&mut self) -> Vec<SchemaWarning> {
        std::mem::take(&mut self.warnings)
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    /// Registers a node with empty adjacency lists.
    pub fn add_node(&mut self, id: ResourceId, metadata: HashMap<String, String>) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(Error::node_exists(&id));
        }
        self.out_edges.insert(id.clone(), Vec::new());
        self.in_edges.insert(id.clone(), Vec::new());
        log::debug!("node added: {id}");
        self.nodes.insert(id.clone(), Node::new(id, metadata));
        Ok(())
    }

    /// Gets a node by ID.
    pub fn get_node(&self, id: &ResourceId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Checks if a node exists.
    pub fn has_node(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Removes a node according to `behavior`.
    pub fn remove_node(&mut self, id: &ResourceId, behavior: DeleteBehavior) -> Result<()> {
        self.remove_node_recorded(id, behavior).map(|_| ())
    }

    /// Removes a node and returns what was taken out.
    ///
    /// - `Restrict` fails with a dependency error, changing nothing, if
    ///   any edge ends at `id`.
    /// - `Cascade` removes every transitive dependent first.
    /// - `SetNull` drops `id`'s edges and leaves dependents in place.
    pub fn remove_node_recorded(
        &mut self,
        id: &ResourceId,
        behavior: DeleteBehavior,
    ) -> Result<Removal> {
        if !self.nodes.contains_key(id) {
            return Err(Error::node_not_found(id));
        }

        let mut removal = Removal::default();
        match behavior {
            DeleteBehavior::Restrict => {
                let dependents = self.direct_dependents(id);
                if !dependents.is_empty() {
                    return Err(Error::Dependency {
                        resource: id.clone(),
                        dependents,
                    });
                }
                self.detach(id, &mut removal);
            }
            DeleteBehavior::Cascade => {
                let mut order = Vec::new();
                let mut visited = HashSet::new();
                self.cascade_order(id, &mut visited, &mut order);
                for node in &order {
                    self.detach(node, &mut removal);
                }
            }
            DeleteBehavior::SetNull => self.detach(id, &mut removal),
        }

        log::debug!(
            "node removed: {id} ({behavior}, {} node(s) total)",
            removal.nodes().len()
        );
        Ok(removal)
    }

    /// Post-order over dependents: every dependent precedes what it depends on.
    pub(crate) fn cascade_order(
        &self,
        id: &ResourceId,
        visited: &mut HashSet<ResourceId>,
        order: &mut Vec<ResourceId>,
    ) {
        if !visited.insert(id.clone()) {
            return;
        }
        // (node, index of the next incoming edge to visit)
        let mut stack = vec![(id.clone(), 0usize)];
        while let Some((node, next)) = stack.last_mut() {
            let incoming = self.in_edges.get(node).map(Vec::as_slice).unwrap_or_default();
            match incoming.get(*next) {
                Some(edge) => {
                    *next += 1;
                    if visited.insert(edge.from.clone()) {
                        stack.push((edge.from.clone(), 0));
                    }
                }
                None => {
                    order.push(node.clone());
                    stack.pop();
                }
            }
        }
    }

    /// Unlinks `id` from every neighbor, then drops the node itself.
    fn detach(&mut self, id: &ResourceId, removal: &mut Removal) {
        let outgoing = self.out_edges.get(id).cloned().unwrap_or_default();
        for edge in outgoing.iter().filter(|e| &e.to != id) {
            if let Some(list) = self.in_edges.get_mut(&edge.to) {
                if let Some(index) = list
                    .iter()
                    .position(|e| e.same_link(&edge.from, &edge.to, edge.relationship))
                {
                    let edge = list.remove(index);
                    removal.steps.push(UndoStep::InEntry {
                        target: edge.to.clone(),
                        index,
                        edge,
                    });
                }
            }
        }

        let incoming = self.in_edges.get(id).cloned().unwrap_or_default();
        for edge in incoming.iter().filter(|e| &e.from != id) {
            if let Some(list) = self.out_edges.get_mut(&edge.from) {
                if let Some(index) = list
                    .iter()
                    .position(|e| e.same_link(&edge.from, &edge.to, edge.relationship))
                {
                    let edge = list.remove(index);
                    removal.steps.push(UndoStep::OutEntry {
                        source: edge.from.clone(),
                        index,
                        edge,
                    });
                }
            }
        }

        if let Some(node) = self.nodes.remove(id) {
            removal.steps.push(UndoStep::Node {
                node,
                outgoing: self.out_edges.remove(id).unwrap_or_default(),
                incoming: self.in_edges.remove(id).unwrap_or_default(),
            });
        }
    }

    /// Puts back everything a [`Removal`] took out, without validation.
    pub fn restore(&mut self, removal: Removal) {
        for step in removal.steps.into_iter().rev() {
            match step {
                UndoStep::Node {
                    node,
                    outgoing,
                    incoming,
                } => {
                    let id = node.id.clone();
                    self.out_edges.insert(id.clone(), outgoing);
                    self.in_edges.insert(id.clone(), incoming);
                    self.nodes.insert(id, node);
                }
                UndoStep::InEntry {
                    target,
                    index,
                    edge,
                } => {
                    let list = self.in_edges.entry(target).or_default();
                    list.insert(index.min(list.len()), edge);
                }
                UndoStep::OutEntry {
                    source,
                    index,
                    edge,
                } => {
                    let list = self.out_edges.entry(source).or_default();
                    list.insert(index.min(list.len()), edge);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------------

    /// Whether the `(from, to, relationship)` edge exists.
    pub fn has_edge(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        relationship: RelationshipType,
    ) -> bool {
        self.out_edges
            .get(from)
            .is_some_and(|edges| edges.iter().any(|e| e.same_link(from, to, relationship)))
    }

    /// Adds an edge.
    ///
    /// Both endpoints must exist. Re-adding an existing `(from, to,
    /// relationship)` succeeds without change. With a schema installed the
    /// edge is checked against it; a violation fails under strict
    /// validation and is recorded as a [`SchemaWarning`] otherwise. With
    /// cycle detection on, an edge whose target already reaches its source
    /// is rejected.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        for end in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(end) {
                return Err(Error::node_not_found(end));
            }
        }

        if self.has_edge(&edge.from, &edge.to, edge.relationship) {
            return Ok(());
        }

        let violation = match self.schema.clone() {
            Some(schema) => self.check_schema(&schema, &edge).err(),
            None => None,
        };
        let violation = match violation {
            Some(err) if self.config.strict_validation => return Err(err),
            other => other,
        };

        if self.config.detect_cycles && self.reaches(&edge.to, &edge.from) {
            return Err(Error::cycle(&edge));
        }

        if let Some(err) = violation {
            log::warn!("schema violation admitted (lenient mode): {err}");
            self.warnings.push(SchemaWarning {
                edge: edge.clone(),
                message: err.to_string(),
            });
        }

        log::debug!("edge added: {edge}");
        self.in_edges
            .entry(edge.to.clone())
            .or_default()
            .push(edge.clone());
        self.out_edges.entry(edge.from.clone()).or_default().push(edge);
        Ok(())
    }

    /// Relationship-kind and cardinality checks against `schema`.
    fn check_schema(&self, schema: &RelationshipSchema, edge: &Edge) -> Result<()> {
        let entry = schema.validate_relationship(&edge.from, &edge.to, edge.relationship)?;
        let cardinality = entry.cardinality;

        if cardinality.limits_source() {
            let to_key = edge.to.type_key();
            let conflict = self.out_edges.get(&edge.from).and_then(|edges| {
                edges
                    .iter()
                    .find(|e| e.relationship == edge.relationship && e.to.type_key() == to_key)
            });
            if let Some(existing) = conflict {
                return Err(Error::Cardinality {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    relationship: edge.relationship,
                    cardinality,
                    existing: existing.to.clone(),
                });
            }
        }

        if cardinality.limits_target() {
            let from_key = edge.from.type_key();
            let conflict = self.in_edges.get(&edge.to).and_then(|edges| {
                edges
                    .iter()
                    .find(|e| e.relationship == edge.relationship && e.from.type_key() == from_key)
            });
            if let Some(existing) = conflict {
                return Err(Error::Cardinality {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    relationship: edge.relationship,
                    cardinality,
                    existing: existing.from.clone(),
                });
            }
        }

        Ok(())
    }

    /// DFS over `out_edges`: is `target` reachable from `start`?
    fn reaches(&self, start: &ResourceId, target: &ResourceId) -> bool {
        let mut stack = vec![start];
        let mut visited: HashSet<&ResourceId> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(edges) = self.out_edges.get(current) {
                stack.extend(edges.iter().map(|e| &e.to));
            }
        }
        false
    }

    /// Removes the `(from, to, relationship)` edge; absent edges are ignored.
    pub fn remove_edge(
        &mut self,
        from: &ResourceId,
        to: &ResourceId,
        relationship: RelationshipType,
    ) {
        if let Some(edges) = self.out_edges.get_mut(from) {
            edges.retain(|e| !e.same_link(from, to, relationship));
        }
        if let Some(edges) = self.in_edges.get_mut(to) {
            edges.retain(|e| !e.same_link(from, to, relationship));
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Edges ending at `id` (one hop).
    pub fn get_dependents(&self, id: &ResourceId) -> Result<Vec<Edge>> {
        self.in_edges
            .get(id)
            .cloned()
            .ok_or_else(|| Error::node_not_found(id))
    }

    /// Edges starting at `id` (one hop).
    pub fn get_dependencies(&self, id: &ResourceId) -> Result<Vec<Edge>> {
        self.out_edges
            .get(id)
            .cloned()
            .ok_or_else(|| Error::node_not_found(id))
    }

    /// Every node that transitively depends on `id`, in BFS order.
    pub fn get_all_dependents(&self, id: &ResourceId) -> Result<Vec<ResourceId>> {
        self.closure(id, &self.in_edges, |e| &e.from)
    }

    /// Every node `id` transitively depends on, in BFS order.
    pub fn get_all_dependencies(&self, id: &ResourceId) -> Result<Vec<ResourceId>> {
        self.closure(id, &self.out_edges, |e| &e.to)
    }

    fn closure<'a>(
        &'a self,
        start: &ResourceId,
        adjacency: &'a HashMap<ResourceId, Vec<Edge>>,
        far_end: impl Fn(&'a Edge) -> &'a ResourceId,
    ) -> Result<Vec<ResourceId>> {
        if !self.nodes.contains_key(start) {
            return Err(Error::node_not_found(start));
        }

        let mut visited: HashSet<&ResourceId> = HashSet::new();
        visited.insert(start);
        let mut queue: VecDeque<&ResourceId> = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            for edge in adjacency.get(current).into_iter().flatten() {
                let next = far_end(edge);
                if visited.insert(next) {
                    result.push(next.clone());
                    queue.push_back(next);
                }
            }
        }
        Ok(result)
    }

    /// Distinct direct dependents of `id`, in edge order.
    fn direct_dependents(&self, id: &ResourceId) -> Vec<ResourceId> {
        let mut seen = HashSet::new();
        self.in_edges
            .get(id)
            .into_iter()
            .flatten()
            .filter(|e| seen.insert(&e.from))
            .map(|e| e.from.clone())
            .collect()
    }

    /// Whether `id` has no dependents; otherwise also returns them.
    ///
    /// Only direct dependents are reported, not the full cascade set.
    pub fn can_delete(&self, id: &ResourceId) -> Result<(bool, Vec<ResourceId>)> {
        if !self.nodes.contains_key(id) {
            return Err(Error::node_not_found(id));
        }
        let dependents = self.direct_dependents(id);
        Ok((dependents.is_empty(), dependents))
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.out_edges.values().map(Vec::len).sum()
    }

    /// Returns an iterator over all nodes.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns an iterator over all edges.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.out_edges.values().flatten()
    }

    /// Snapshot of all nodes.
    pub fn all_nodes(&self) -> Vec<Node> {
        self.iter_nodes().cloned().collect()
    }

    /// Snapshot of all edges.
    pub fn all_edges(&self) -> Vec<Edge> {
        self.iter_edges().cloned().collect()
    }
}

// ============================================================================
// RelationshipGraph
// ============================================================================

/// Thread-safe relationship graph.
///
/// Single-step operations lock internally. For multi-step atomicity use
/// [`read`](Self::read) / [`write`](Self::write) and call the
/// [`GraphState`] methods on the guard; dropping the guard releases the
/// lock. A poisoned lock is recovered rather than propagated, since every
/// mutation leaves the tables consistent before it can panic.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    state: RwLock<GraphState>,
}

impl RelationshipGraph {
    /// Creates an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            state: RwLock::new(GraphState::new(config)),
        }
    }

    /// Takes the shared lock.
    pub fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the exclusive lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active configuration.
    pub fn config(&self) -> GraphConfig {
        self.read().config().clone()
    }

    /// Replaces the configuration.
    pub fn set_config(&self, config: GraphConfig) {
        self.write().set_config(config);
    }

    /// Active schema, if any.
    pub fn get_schema(&self) -> Option<Arc<RelationshipSchema>> {
        self.read().schema()
    }

    /// Installs a schema.
    pub fn set_schema(&self, schema: RelationshipSchema) {
        self.write().set_schema(Some(Arc::new(schema)));
    }

    /// Removes the schema; only existence and cycle checks remain.
    pub fn clear_schema(&self) {
        self.write().set_schema(None);
    }

    /// See [`GraphState::add_node`].
    pub fn add_node(&self, id: ResourceId, metadata: HashMap<String, String>) -> Result<()> {
        self.write().add_node(id, metadata)
    }

    /// See [`GraphState::remove_node_recorded`].
    pub fn remove_node(&self, id: &ResourceId, behavior: DeleteBehavior) -> Result<()> {
        self.write().remove_node(id, behavior)
    }

    /// Removes a node using the configured default behavior.
    pub fn remove_node_default(&self, id: &ResourceId) -> Result<()> {
        let mut state = self.write();
        let behavior = state.config().default_delete_behavior;
        state.remove_node(id, behavior)
    }

    /// See [`GraphState::add_edge`].
    pub fn add_edge(&self, edge: Edge) -> Result<()> {
        self.write().add_edge(edge)
    }

    /// See [`GraphState::remove_edge`].
    pub fn remove_edge(&self, from: &ResourceId, to: &ResourceId, relationship: RelationshipType) {
        self.write().remove_edge(from, to, relationship);
    }

    /// Gets a copy of a node.
    pub fn get_node(&self, id: &ResourceId) -> Option<Node> {
        self.read().get_node(id).cloned()
    }

    /// Checks if a node exists.
    pub fn has_node(&self, id: &ResourceId) -> bool {
        self.read().has_node(id)
    }

    /// See [`GraphState::get_dependents`].
    pub fn get_dependents(&self, id: &ResourceId) -> Result<Vec<Edge>> {
        self.read().get_dependents(id)
    }

    /// See [`GraphState::get_dependencies`].
    pub fn get_dependencies(&self, id: &ResourceId) -> Result<Vec<Edge>> {
        self.read().get_dependencies(id)
    }

    /// See [`GraphState::get_all_dependents`].
    pub fn get_all_dependents(&self, id: &ResourceId) -> Result<Vec<ResourceId>> {
        self.read().get_all_dependents(id)
    }

    /// See [`GraphState::get_all_dependencies`].
    pub fn get_all_dependencies(&self, id: &ResourceId) -> Result<Vec<ResourceId>> {
        self.read().get_all_dependencies(id)
    }

    /// See [`GraphState::can_delete`].
    pub fn can_delete(&self, id: &ResourceId) -> Result<(bool, Vec<ResourceId>)> {
        self.read().can_delete(id)
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }

    /// Snapshot of all nodes.
    pub fn all_nodes(&self) -> Vec<Node> {
        self.read().all_nodes()
    }

    /// Snapshot of all edges.
    pub fn all_edges(&self) -> Vec<Edge> {
        self.read().all_edges()
    }

    /// Drains warnings recorded under lenient validation.
    pub fn take_warnings(&self) -> Vec<SchemaWarning> {
        self.write().take_warnings()
    }
}

// ============================================================================
// Tests
// ============================================================================
