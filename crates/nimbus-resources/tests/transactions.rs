//! Create/delete coordination between the graph and the state store.

use nimbus_core::store::mock::FailingStateStore;
use nimbus_core::{
    DeleteBehavior, MemoryStateStore, RelationshipType, ResourceId, StateStore,
};
use nimbus_resources::{ResourceManager, ResourceManagerConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct SubnetData {
    cidr: String,
    availability_zone: String,
}

fn vpc() -> ResourceId {
    ResourceId::new("ec2", "vpc", "vpc-1")
}

fn subnet() -> ResourceId {
    ResourceId::new("ec2", "subnet", "subnet-1")
}

fn instance() -> ResourceId {
    ResourceId::new("ec2", "instance", "i-1")
}

fn key(id: &ResourceId) -> String {
    id.to_string()
}

/// vpc <- subnet <- instance, each with a stored payload.
fn network(store: Arc<dyn StateStore>, behavior: DeleteBehavior) -> ResourceManager {
    let manager = ResourceManager::new(
        store,
        ResourceManagerConfig {
            delete_behavior: behavior,
            ..ResourceManagerConfig::default()
        },
    );
    for id in [vpc(), subnet(), instance()] {
        manager
            .create_resource(id.clone(), &key(&id), &json!({ "id": id.id }))
            .unwrap();
    }
    manager
        .add_relationship(&subnet(), &vpc(), RelationshipType::Contains)
        .unwrap();
    manager
        .add_relationship(&instance(), &subnet(), RelationshipType::References)
        .unwrap();
    manager
}

// ----------------------------------------------------------------------------
// Round trips
// ----------------------------------------------------------------------------

#[test]
fn test_create_then_delete_cleans_both_stores() {
    let store = Arc::new(MemoryStateStore::new());
    let manager = ResourceManager::new(store.clone(), ResourceManagerConfig::default());

    let data = SubnetData {
        cidr: "10.0.1.0/24".to_string(),
        availability_zone: "us-east-1a".to_string(),
    };
    manager
        .create_resource(subnet(), &key(&subnet()), &data)
        .unwrap();
    assert!(manager.has_resource(&subnet()));

    let loaded: SubnetData = manager.get_resource_data(&key(&subnet())).unwrap();
    assert_eq!(loaded, data);

    manager.delete_resource(&subnet(), &key(&subnet())).unwrap();
    assert!(!manager.has_resource(&subnet()));
    assert!(!store.exists(&key(&subnet())));
    assert!(store.is_empty());
}

#[test]
fn test_delete_missing_resource() {
    let store = Arc::new(FailingStateStore::new());
    let manager = ResourceManager::new(store.clone(), ResourceManagerConfig::default());

    let err = manager.delete_resource(&vpc(), "anything").unwrap_err();
    assert!(err.is_node_not_found());
    assert_eq!(store.delete_calls(), 0);
}

#[test]
fn test_cascade_delete_removes_graph_dependents() {
    let store = Arc::new(MemoryStateStore::new());
    let manager = network(store.clone(), DeleteBehavior::Cascade);

    manager.delete_resource(&vpc(), &key(&vpc())).unwrap();
    assert!(!manager.has_resource(&vpc()));
    assert!(!manager.has_resource(&subnet()));
    assert!(!manager.has_resource(&instance()));
    assert_eq!(manager.graph().edge_count(), 0);

    // Only the named key is deleted from the store.
    assert!(!store.exists(&key(&vpc())));
    assert!(store.exists(&key(&subnet())));
}

#[test]
fn test_set_null_delete_keeps_dependents() {
    let store = Arc::new(MemoryStateStore::new());
    let manager = network(store, DeleteBehavior::SetNull);

    manager.delete_resource(&subnet(), &key(&subnet())).unwrap();
    assert!(manager.has_resource(&vpc()));
    assert!(manager.has_resource(&instance()));
    assert!(manager.get_dependencies(&instance()).unwrap().is_empty());
    assert!(manager.get_dependents(&vpc()).unwrap().is_empty());
}

// ----------------------------------------------------------------------------
// Rollback
// ----------------------------------------------------------------------------

#[test]
fn test_delete_rollback_restores_symmetry() {
    let store = Arc::new(FailingStateStore::new());
    let manager = ResourceManager::new(store.clone(), ResourceManagerConfig::default());
    manager.create_resource(vpc(), &key(&vpc()), &json!({})).unwrap();
    manager
        .create_resource(subnet(), &key(&subnet()), &json!({}))
        .unwrap();
    manager
        .add_relationship(&subnet(), &vpc(), RelationshipType::Contains)
        .unwrap();

    store.fail_deletes(true);
    let err = manager
        .delete_resource(&subnet(), &key(&subnet()))
        .unwrap_err();

    assert!(err.is_rollback());
    let message = err.to_string();
    assert!(message.contains("failed to delete resource data"));
    assert!(message.contains("graph restored"));

    assert!(manager.has_resource(&subnet()));
    assert_eq!(manager.get_dependencies(&subnet()).unwrap(), vec![vpc()]);
    assert_eq!(manager.get_dependents(&vpc()).unwrap(), vec![subnet()]);
    assert!(store.exists(&key(&subnet())));
    assert!(manager.graph().validate().valid);
}

#[test]
fn test_cascade_rollback_restores_every_removed_node() {
    let store = Arc::new(FailingStateStore::new());
    let manager = network(store.clone(), DeleteBehavior::Cascade);
    let before_edges = manager.graph().all_edges();
    let before_nodes = manager.graph().node_count();

    store.fail_deletes(true);
    let err = manager.delete_resource(&vpc(), &key(&vpc())).unwrap_err();
    assert!(err.is_rollback());

    assert_eq!(manager.graph().node_count(), before_nodes);
    assert_eq!(manager.graph().edge_count(), before_edges.len());
    for edge in &before_edges {
        assert!(manager.graph().read().has_edge(&edge.from, &edge.to, edge.relationship));
    }
    assert_eq!(
        manager.graph().get_all_dependents(&vpc()).unwrap().len(),
        2
    );

    // Once the store recovers, the same call goes through.
    store.fail_deletes(false);
    manager.delete_resource(&vpc(), &key(&vpc())).unwrap();
    assert_eq!(manager.graph().node_count(), 0);
}

// ----------------------------------------------------------------------------
// Create asymmetry
// ----------------------------------------------------------------------------

/// A failed graph registration leaves the state write in place.
#[test]
fn test_create_graph_failure_keeps_state_write() {
    let store = Arc::new(MemoryStateStore::new());
    let manager = ResourceManager::new(store.clone(), ResourceManagerConfig::default());
    manager
        .create_resource(vpc(), "first", &json!({"n": 1}))
        .unwrap();

    let err = manager
        .create_resource(vpc(), "second", &json!({"n": 2}))
        .unwrap_err();
    assert!(err.is_node_exists());
    assert!(store.exists("second"));
    assert_eq!(manager.graph().node_count(), 1);
}
