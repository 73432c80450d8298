//! Strict and lenient schema enforcement through the manager.

use nimbus_core::{MemoryStateStore, RelationshipType, ResourceId};
use nimbus_graph::aws_relationship_schema;
use nimbus_resources::{NimbusConfig, ResourceManager, ResourceManagerConfig};
use std::collections::HashMap;
use std::sync::Arc;

fn rid(resource_type: &str, id: &str) -> ResourceId {
    ResourceId::new("ec2", resource_type, id)
}

fn aws_manager(strict: bool) -> ResourceManager {
    let manager = ResourceManager::new(
        Arc::new(MemoryStateStore::new()),
        ResourceManagerConfig {
            strict_validation: strict,
            ..ResourceManagerConfig::default()
        },
    );
    manager.set_schema(aws_relationship_schema());
    manager
}

fn register(manager: &ResourceManager, ids: &[&ResourceId]) {
    for id in ids {
        manager
            .register_resource((*id).clone(), HashMap::new())
            .unwrap();
    }
}

#[test]
fn test_same_call_fails_strict_succeeds_lenient() {
    let vpc = rid("vpc", "v1");
    let subnet = rid("subnet", "s1");

    let manager = aws_manager(true);
    register(&manager, &[&vpc, &subnet]);

    let err = manager
        .add_relationship(&vpc, &subnet, RelationshipType::AssociatedWith)
        .unwrap_err();
    assert!(err.is_schema_validation());
    assert_eq!(manager.graph().edge_count(), 0);

    manager.set_validation_mode(false);
    manager
        .add_relationship(&vpc, &subnet, RelationshipType::AssociatedWith)
        .unwrap();
    assert_eq!(manager.graph().edge_count(), 1);
    assert_eq!(manager.get_dependencies(&vpc).unwrap(), vec![subnet.clone()]);

    let warnings = manager.graph().take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].edge.relationship, RelationshipType::AssociatedWith);
}

#[test]
fn test_one_to_one_cardinality() {
    let manager = aws_manager(true);
    let vpc = rid("vpc", "v1");
    let igw1 = rid("internet-gateway", "igw-1");
    let igw2 = rid("internet-gateway", "igw-2");
    register(&manager, &[&vpc, &igw1, &igw2]);

    manager
        .add_relationship(&igw1, &vpc, RelationshipType::AttachedTo)
        .unwrap();
    let err = manager
        .add_relationship(&igw2, &vpc, RelationshipType::AttachedTo)
        .unwrap_err();
    assert!(err.is_cardinality());
    assert_eq!(manager.get_dependents(&vpc).unwrap(), vec![igw1]);
}

#[test]
fn test_many_to_one_allows_many_sources() {
    let manager = aws_manager(true);
    let vpc = rid("vpc", "v1");
    let s1 = rid("subnet", "s1");
    let s2 = rid("subnet", "s2");
    register(&manager, &[&vpc, &s1, &s2]);

    manager
        .add_relationship(&s1, &vpc, RelationshipType::Contains)
        .unwrap();
    manager
        .add_relationship(&s2, &vpc, RelationshipType::Contains)
        .unwrap();
    assert_eq!(manager.get_dependents(&vpc).unwrap().len(), 2);
}

#[test]
fn test_lenient_admits_cardinality_violation() {
    let manager = aws_manager(false);
    let vpc = rid("vpc", "v1");
    let igw1 = rid("internet-gateway", "igw-1");
    let igw2 = rid("internet-gateway", "igw-2");
    register(&manager, &[&vpc, &igw1, &igw2]);

    manager
        .add_relationship(&igw1, &vpc, RelationshipType::AttachedTo)
        .unwrap();
    manager
        .add_relationship(&igw2, &vpc, RelationshipType::AttachedTo)
        .unwrap();
    assert_eq!(manager.get_dependents(&vpc).unwrap().len(), 2);
    assert_eq!(manager.graph().take_warnings().len(), 1);
    assert!(manager.graph().validate().valid);
}

#[test]
fn test_cycles_rejected_in_either_mode() {
    for strict in [true, false] {
        let manager = ResourceManager::new(
            Arc::new(MemoryStateStore::new()),
            ResourceManagerConfig {
                strict_validation: strict,
                ..ResourceManagerConfig::default()
            },
        );
        let a = rid("instance", "a");
        let b = rid("instance", "b");
        register(&manager, &[&a, &b]);

        manager
            .add_relationship(&a, &b, RelationshipType::References)
            .unwrap();
        let err = manager
            .add_relationship(&b, &a, RelationshipType::References)
            .unwrap_err();
        assert!(err.is_cycle());
    }
}

#[test]
fn test_config_built_manager_enforces_aws_schema() {
    let mut config = NimbusConfig::default();
    config.manager.strict_validation = true;
    let manager = config.build_manager(Arc::new(MemoryStateStore::new()));

    let vpc = rid("vpc", "v1");
    let subnet = rid("subnet", "s1");
    register(&manager, &[&vpc, &subnet]);

    assert!(
        manager
            .add_relationship(&vpc, &subnet, RelationshipType::Contains)
            .unwrap_err()
            .is_schema_validation()
    );
    manager
        .add_relationship(&subnet, &vpc, RelationshipType::Contains)
        .unwrap();
}
