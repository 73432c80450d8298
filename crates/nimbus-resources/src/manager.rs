//! Resource manager.
//!
//! [`ResourceManager`] keeps the relationship graph and the state store in
//! step. Create and delete take the graph's write lock once and hold it
//! across both stores, so no reader ever sees a resource that exists in one
//! and not the other mid-operation.

use nimbus_core::{
    DeleteBehavior, Edge, Error, RelationshipType, ResourceId, Result, StateStore, StateStoreExt,
};
use nimbus_graph::{GraphConfig, RelationshipGraph, RelationshipSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Configuration
// ============================================================================

/// Behavior switches for a [`ResourceManager`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManagerConfig {
    /// Fail (rather than warn) on schema violations.
    #[serde(deserialize_with = "crate::config::bool_or_string")]
    pub strict_validation: bool,
    /// How `delete_resource` treats dependents.
    pub delete_behavior: DeleteBehavior,
    /// Reject edges that would close a cycle.
    #[serde(deserialize_with = "crate::config::bool_or_string")]
    pub detect_cycles: bool,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            delete_behavior: DeleteBehavior::Restrict,
            detect_cycles: true,
        }
    }
}

impl ResourceManagerConfig {
    /// The graph configuration this manager config implies.
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            strict_validation: self.strict_validation,
            default_delete_behavior: self.delete_behavior,
            detect_cycles: self.detect_cycles,
        }
    }
}

// ============================================================================
// ResourceManager
// ============================================================================

/// Coordinates the relationship graph with resource payload storage.
pub struct ResourceManager {
    graph: Arc<RelationshipGraph>,
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Creates a manager over a fresh graph.
    pub fn new(store: Arc<dyn StateStore>, config: ResourceManagerConfig) -> Self {
        let graph = RelationshipGraph::with_config(config.graph_config());
        Self {
            graph: Arc::new(graph),
            store,
        }
    }

    /// Creates a manager over an existing graph, applying `config` to it.
    pub fn with_graph(
        graph: Arc<RelationshipGraph>,
        store: Arc<dyn StateStore>,
        config: ResourceManagerConfig,
    ) -> Self {
        graph.set_config(config.graph_config());
        Self { graph, store }
    }

    /// The underlying graph.
    pub fn graph(&self) -> &Arc<RelationshipGraph> {
        &self.graph
    }

    /// The underlying state store.
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Current effective configuration, read from the graph.
    pub fn config(&self) -> ResourceManagerConfig {
        let graph = self.graph.config();
        ResourceManagerConfig {
            strict_validation: graph.strict_validation,
            delete_behavior: graph.default_delete_behavior,
            detect_cycles: graph.detect_cycles,
        }
    }

    // ------------------------------------------------------------------------
    // Validation mode / schema
    // ------------------------------------------------------------------------

    /// Switches between strict and lenient schema enforcement.
    pub fn set_validation_mode(&self, strict: bool) {
        let mut state = self.graph.write();
        let mut config = state.config().clone();
        config.strict_validation = strict;
        state.set_config(config);
    }

    /// Whether schema violations currently fail.
    pub fn is_strict_mode(&self) -> bool {
        self.graph.read().config().strict_validation
    }

    /// Installs a relationship schema on the graph.
    pub fn set_schema(&self, schema: RelationshipSchema) {
        self.graph.set_schema(schema);
    }

    // ------------------------------------------------------------------------
    // Graph wrappers
    // ------------------------------------------------------------------------

    /// Registers a resource in the graph only.
    pub fn register_resource(
        &self,
        id: ResourceId,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.graph.add_node(id, metadata)
    }

    /// Whether the resource is registered.
    pub fn has_resource(&self, id: &ResourceId) -> bool {
        self.graph.has_node(id)
    }

    /// Records that `from` depends on `to`.
    pub fn add_relationship(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        relationship: RelationshipType,
    ) -> Result<()> {
        self.graph
            .add_edge(Edge::new(from.clone(), to.clone(), relationship))
    }

    /// Drops the relationship; a missing one is ignored.
    pub fn remove_relationship(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        relationship: RelationshipType,
    ) {
        self.graph.remove_edge(from, to, relationship);
    }

    /// Resources `id` directly depends on.
    pub fn get_dependencies(&self, id: &ResourceId) -> Result<Vec<ResourceId>> {
        Ok(self
            .graph
            .get_dependencies(id)?
            .into_iter()
            .map(|edge| edge.to)
            .collect())
    }

    /// Resources directly depending on `id`.
    pub fn get_dependents(&self, id: &ResourceId) -> Result<Vec<ResourceId>> {
        Ok(self
            .graph
            .get_dependents(id)?
            .into_iter()
            .map(|edge| edge.from)
            .collect())
    }

    /// Whether `id` has no dependents; otherwise also returns them.
    pub fn can_delete(&self, id: &ResourceId) -> Result<(bool, Vec<ResourceId>)> {
        self.graph.can_delete(id)
    }

    // ------------------------------------------------------------------------
    // Two-store operations
    // ------------------------------------------------------------------------

    /// Stores `data` under `state_key`, then registers `id` in the graph.
    ///
    /// The state write is not undone if graph registration fails (for
    /// instance because `id` already exists); callers must treat such an
    /// error as fatal for the resource.
    pub fn create_resource<T: Serialize + ?Sized>(
        &self,
        id: ResourceId,
        state_key: &str,
        data: &T,
    ) -> Result<()> {
        let mut state = self.graph.write();
        self.store.set_json(state_key, data)?;
        state.add_node(id.clone(), HashMap::new())?;
        log::debug!("resource created: {id} (state key {state_key})");
        Ok(())
    }

    /// Removes `id` from the graph and `state_key` from the store.
    ///
    /// Dependents are handled by the graph's current default delete
    /// behavior.
    ///
    /// Graph errors (missing node, restrict with dependents) are returned
    /// unchanged and nothing is touched. If the store delete fails, every
    /// node and edge the graph removal took out is put back and
    /// [`Error::RollbackCompleted`] is returned.
    pub fn delete_resource(&self, id: &ResourceId, state_key: &str) -> Result<()> {
        let mut state = self.graph.write();
        let behavior = state.config().default_delete_behavior;
        let removal = state.remove_node_recorded(id, behavior)?;

        if let Err(err) = self.store.delete(state_key) {
            state.restore(removal);
            log::warn!("delete of {id} rolled back: {err}");
            return Err(Error::RollbackCompleted {
                resource: id.clone(),
                source: Box::new(err),
            });
        }

        log::debug!(
            "resource deleted: {id} ({} node(s) removed from graph)",
            removal.nodes().len()
        );
        Ok(())
    }

    /// Loads and deserializes the payload under `state_key`.
    pub fn get_resource_data<T: DeserializeOwned>(&self, state_key: &str) -> Result<T> {
        self.store.get_json(state_key)
    }
}

// ============================================================================
// Tests
// ============================================================================
