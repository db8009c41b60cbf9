use proptest::prelude::*;

use super::common::{assert_dependencies_first, edges};
use crate::engine::{DependencyGraph, DependencyManager, Relation};
use bindgraph_common::PropertyPath;

fn node(i: u8) -> String {
    format!("N{i}.v")
}

fn relation(from: u8, to: u8) -> Relation {
    Relation {
        dependent_entity: format!("N{to}"),
        dependent_path: PropertyPath::key("v"),
        dependency_entity: format!("N{from}"),
        dependency_path: PropertyPath::key("v"),
    }
}

fn edge_list() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..12, 0u8..12), 0..40)
}

proptest! {
    #[test]
    fn guarded_graph_always_sorts(pairs in edge_list()) {
        let mut g = DependencyGraph::new();
        for (from, to) in pairs {
            let (from, to) = (node(from), node(to));
            if !g.would_create_cycle(&from, &to) {
                g.add_edge(&from, &to);
            }
        }
        let order = g.topological_order(false).unwrap();
        prop_assert_eq!(order.len(), g.len());
        assert_dependencies_first(&order, &edges(&g));
    }

    #[test]
    fn trials_never_change_the_graph(pairs in edge_list(), probes in edge_list()) {
        let mut g = DependencyGraph::new();
        for (from, to) in pairs {
            let (from, to) = (node(from), node(to));
            if !g.would_create_cycle(&from, &to) {
                g.add_edge(&from, &to);
            }
        }
        for (from, to) in probes {
            let nodes: Vec<String> = g.node_keys().iter().map(|k| k.to_string()).collect();
            let before = edges(&g);
            g.would_create_cycle(&node(from), &node(to));
            prop_assert_eq!(edges(&g), before);
            prop_assert_eq!(g.node_keys(), nodes);
        }
    }

    #[test]
    fn rejected_commits_leave_no_trace(batches in prop::collection::vec(edge_list(), 1..6)) {
        let mut m = DependencyManager::default();
        for batch in batches {
            let relations: Vec<Relation> = batch.iter().map(|&(f, t)| relation(f, t)).collect();
            let before = edges(m.graph());
            if m.commit(&relations).is_err() {
                prop_assert_eq!(edges(m.graph()), before);
            }
            assert_dependencies_first(&m.topological_order(), &edges(m.graph()));
        }
    }
}
