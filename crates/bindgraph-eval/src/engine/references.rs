//! Turning raw property values into `entity.path` dependencies.
//!
//! The syntax half (binding spans, parsing, scope-aware chain collection)
//! lives in `bindgraph-parse`; this module resolves the collected chains
//! against the paths each known entity currently registers.

use std::collections::{BTreeMap, BTreeSet};

use bindgraph_common::{PropertyPath, node_key};
use bindgraph_parse::{
    ReferenceChain, collect_program_references, collect_reference_chains, find_bindings,
    parse_expression, parse_program,
};
use serde_json::Value as JsonValue;

use crate::entity::{Entity, ValueStore};

/// Paths one entity exposes to reference resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityKeys {
    /// Concrete evaluable paths.
    pub evaluable: BTreeSet<PropertyPath>,
    /// Top-level keys of the raw value tree.
    pub top_level: BTreeSet<PropertyPath>,
}

impl EntityKeys {
    pub fn of(entity: &Entity) -> Self {
        Self {
            evaluable: entity.evaluable_paths().into_iter().collect(),
            top_level: entity.top_level_paths().into_iter().collect(),
        }
    }

    /// Resolve the member part of a chain headed by this entity.
    ///
    /// Permutations are tried shortest first and the first evaluable one wins.
    /// Failing that, a chain over a raw top-level key depends on that key plus
    /// every evaluable path below the chain, and a chain that is only a prefix
    /// of evaluable paths depends on all of them. Anything else is dynamic and
    /// ignored.
    pub fn resolve(&self, path: &PropertyPath) -> Vec<PropertyPath> {
        if path.is_root() {
            return self.evaluable.iter().cloned().collect();
        }
        if let Some(hit) = path.prefixes().find(|p| self.evaluable.contains(p)) {
            return vec![hit];
        }
        let mut out = Vec::new();
        if let Some(first) = path.prefixes().next() {
            if self.top_level.contains(&first) {
                out.push(first);
            }
        }
        out.extend(self.evaluable.iter().filter(|p| p.starts_with(path)).cloned());
        out
    }
}

/// Known entities and their registered paths.
pub type KeyIndex = BTreeMap<String, EntityKeys>;

/// One `dependency -> dependent` relation between two entity paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relation {
    pub dependent_entity: String,
    pub dependent_path: PropertyPath,
    pub dependency_entity: String,
    pub dependency_path: PropertyPath,
}

impl Relation {
    pub fn dependent_key(&self) -> String {
        node_key(&self.dependent_entity, &self.dependent_path)
    }

    pub fn dependency_key(&self) -> String {
        node_key(&self.dependency_entity, &self.dependency_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub dependencies: Vec<Relation>,
    pub is_code: bool,
}

/// Discovers the entity paths a raw value reads.
pub struct ReferenceExtractor<'a> {
    keys: &'a KeyIndex,
}

impl<'a> ReferenceExtractor<'a> {
    pub fn new(keys: &'a KeyIndex) -> Self {
        Self { keys }
    }

    /// Extract the dependencies of the raw value at `entity.path`.
    ///
    /// Non-string values are not code; arrays are walked per element so each
    /// element's bindings count towards `path`. A binding that fails to parse
    /// contributes nothing; the evaluator reports the syntax error later.
    pub fn extract(&self, raw: &JsonValue, entity: &str, path: &PropertyPath) -> Extraction {
        let mut chains = Vec::new();
        let is_code = collect_value_chains(raw, &mut chains);

        let mut seen = BTreeSet::new();
        let mut dependencies = Vec::new();
        for chain in chains {
            for target in self.resolve_chain(&chain) {
                if seen.insert(target.clone()) {
                    dependencies.push(Relation {
                        dependent_entity: entity.to_string(),
                        dependent_path: path.clone(),
                        dependency_entity: target.0,
                        dependency_path: target.1,
                    });
                }
            }
        }
        Extraction {
            dependencies,
            is_code,
        }
    }

    fn resolve_chain(&self, chain: &ReferenceChain) -> Vec<(String, PropertyPath)> {
        let Some(keys) = self.keys.get(&chain.head) else {
            return Vec::new();
        };
        keys.resolve(&chain.path)
            .into_iter()
            .map(|p| (chain.head.clone(), p))
            .collect()
    }
}

/// Push the free chains of every binding in `raw`; true when any binding exists.
fn collect_value_chains(raw: &JsonValue, out: &mut Vec<ReferenceChain>) -> bool {
    match raw {
        JsonValue::String(text) => {
            let spans = find_bindings(text);
            for span in &spans {
                binding_chains(span.inner(text), out);
            }
            !spans.is_empty()
        }
        JsonValue::Array(items) => items
            .iter()
            .fold(false, |code, item| collect_value_chains(item, out) || code),
        _ => false,
    }
}

/// Property bindings are expressions; event handlers may be statement lists.
fn binding_chains(source: &str, out: &mut Vec<ReferenceChain>) {
    if let Ok(ast) = parse_expression(source) {
        out.extend(collect_reference_chains(&ast));
    } else if let Ok(program) = parse_program(source) {
        out.extend(collect_program_references(&program));
    } else {
        #[cfg(feature = "tracing")]
        tracing::trace!(source, "binding does not parse; no dependencies");
    }
}
