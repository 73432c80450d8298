//! Property tests for graph invariants under random operation sequences.

use nimbus_core::{DeleteBehavior, Edge, RelationshipType, ResourceId};
use nimbus_graph::{RelationshipGraph, validate_graph};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

const NODES: usize = 8;

#[derive(Clone, Debug)]
enum Op {
    AddEdge(usize, usize, u8),
    RemoveEdge(usize, usize, u8),
    RemoveNode(usize, u8),
}

fn rid(i: usize) -> ResourceId {
    ResourceId::new("ec2", "instance", format!("i-{i}"))
}

fn relationship(r: u8) -> RelationshipType {
    match r % 4 {
        0 => RelationshipType::Contains,
        1 => RelationshipType::References,
        2 => RelationshipType::AttachedTo,
        _ => RelationshipType::AssociatedWith,
    }
}

fn behavior(b: u8) -> DeleteBehavior {
    match b % 3 {
        0 => DeleteBehavior::Restrict,
        1 => DeleteBehavior::Cascade,
        _ => DeleteBehavior::SetNull,
    }
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..NODES, 0..NODES, any::<u8>()).prop_map(|(a, b, r)| Op::AddEdge(a, b, r)),
        1 => (0..NODES, 0..NODES, any::<u8>()).prop_map(|(a, b, r)| Op::RemoveEdge(a, b, r)),
        1 => (0..NODES, any::<u8>()).prop_map(|(a, b)| Op::RemoveNode(a, b)),
    ]
}

fn build(ops: &[Op]) -> RelationshipGraph {
    let graph = RelationshipGraph::new();
    for i in 0..NODES {
        graph.add_node(rid(i), HashMap::new()).unwrap();
    }
    for op in ops {
        // Failures (cycles, missing nodes, restrict) are expected; only
        // the resulting state matters.
        match *op {
            Op::AddEdge(a, b, r) => {
                let _ = graph.add_edge(Edge::new(rid(a), rid(b), relationship(r)));
            }
            Op::RemoveEdge(a, b, r) => graph.remove_edge(&rid(a), &rid(b), relationship(r)),
            Op::RemoveNode(a, b) => {
                let _ = graph.remove_node(&rid(a), behavior(b));
            }
        }
    }
    graph
}

fn edge_set(graph: &RelationshipGraph) -> BTreeSet<String> {
    graph.all_edges().iter().map(ToString::to_string).collect()
}

proptest! {
    #[test]
    fn prop_graph_stays_consistent_and_acyclic(ops in prop::collection::vec(op(), 0..60)) {
        let graph = build(&ops);
        let result = validate_graph(&graph.read());
        prop_assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn prop_duplicate_edges_never_stored(ops in prop::collection::vec(op(), 0..60)) {
        let graph = build(&ops);
        prop_assert_eq!(edge_set(&graph).len(), graph.edge_count());
    }

    #[test]
    fn prop_restore_undoes_any_removal(
        ops in prop::collection::vec(op(), 0..60),
        victim in 0..NODES,
        b in any::<u8>(),
    ) {
        let graph = build(&ops);
        let before_nodes: BTreeSet<ResourceId> =
            graph.all_nodes().into_iter().map(|n| n.id).collect();
        let before_edges = edge_set(&graph);

        let mut state = graph.write();
        if let Ok(removal) = state.remove_node_recorded(&rid(victim), behavior(b)) {
            state.restore(removal);
        }
        drop(state);

        let after_nodes: BTreeSet<ResourceId> =
            graph.all_nodes().into_iter().map(|n| n.id).collect();
        prop_assert_eq!(after_nodes, before_nodes);
        prop_assert_eq!(edge_set(&graph), before_edges);
        prop_assert!(validate_graph(&graph.read()).valid);
    }

    #[test]
    fn prop_cascade_leaves_no_dependents(
        ops in prop::collection::vec(op(), 0..60),
        victim in 0..NODES,
    ) {
        let graph = build(&ops);
        if let Ok(dependents) = graph.get_all_dependents(&rid(victim)) {
            graph.remove_node(&rid(victim), DeleteBehavior::Cascade).unwrap();
            prop_assert!(!graph.has_node(&rid(victim)));
            for id in dependents {
                prop_assert!(!graph.has_node(&id));
            }
        }
    }
}
