use bindgraph_common::{EntityKind, split_node_key};

use crate::engine::{EntityKeys, Extraction, KeyIndex, Relation};
use crate::entity::{Entity, EntityConfig, ValueStore};

/// Key index over freshly built entities.
pub fn key_index(entities: Vec<(EntityKind, EntityConfig)>) -> KeyIndex {
    entities
        .into_iter()
        .map(|(kind, config)| {
            let entity = Entity::new(kind, config).unwrap();
            (entity.id().to_string(), EntityKeys::of(&entity))
        })
        .collect()
}

/// `dependent` reads `dependency`; both are `entity.path` keys.
pub fn relation(dependent: &str, dependency: &str) -> Relation {
    let (dependent_entity, dependent_path) = split_node_key(dependent).unwrap();
    let (dependency_entity, dependency_path) = split_node_key(dependency).unwrap();
    Relation {
        dependent_entity: dependent_entity.to_string(),
        dependent_path,
        dependency_entity: dependency_entity.to_string(),
        dependency_path,
    }
}

/// Code extraction for `node` reading every key in `dependencies`.
pub fn code_reading(node: &str, dependencies: &[&str]) -> Extraction {
    Extraction {
        dependencies: dependencies.iter().map(|d| relation(node, d)).collect(),
        is_code: true,
    }
}

pub fn edges(graph: &crate::engine::DependencyGraph) -> Vec<(String, String)> {
    graph
        .edges()
        .into_iter()
        .map(|(f, t)| (f.to_string(), t.to_string()))
        .collect()
}

pub fn assert_dependencies_first(order: &[String], edges: &[(String, String)]) {
    let position = |key: &str| order.iter().position(|k| k == key).unwrap();
    for (from, to) in edges {
        assert!(
            position(from) < position(to),
            "{from} must come before {to} in {order:?}"
        );
    }
}
