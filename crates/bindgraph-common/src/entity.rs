//! Entity identity: the addressable objects (widgets, queries, globals) whose
//! properties bindings may read.

use std::fmt;

use crate::path::PropertyPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntityKind {
    Widget,
    Query,
    Global,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Widget => "widget",
            EntityKind::Query => "query",
            EntityKind::Global => "global",
        })
    }
}

/// Tagged reference to an entity. Widgets, queries and globals expose the same
/// value-store surface but are never confused with one another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Widget(String),
    Query(String),
    Global(String),
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        match kind {
            EntityKind::Widget => EntityRef::Widget(id.into()),
            EntityKind::Query => EntityRef::Query(id.into()),
            EntityKind::Global => EntityRef::Global(id.into()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRef::Widget(id) | EntityRef::Query(id) | EntityRef::Global(id) => id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Widget(_) => EntityKind::Widget,
            EntityRef::Query(_) => EntityKind::Query,
            EntityRef::Global(_) => EntityKind::Global,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Validate that an id can head a graph node key and be read as an identifier
/// inside a binding.
pub fn is_valid_entity_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Graph node key `"<entityId>.<path>"`.
pub fn node_key(entity_id: &str, path: &PropertyPath) -> String {
    let path = path.to_string();
    if path.starts_with('[') {
        format!("{entity_id}{path}")
    } else {
        format!("{entity_id}.{path}")
    }
}

/// Split a node key back into `(entity_id, path)`.
pub fn split_node_key(key: &str) -> Option<(&str, PropertyPath)> {
    let cut = key.find(['.', '['])?;
    let (entity, rest) = key.split_at(cut);
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    PropertyPath::parse(rest).ok().map(|path| (entity, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_follow_identifier_rules() {
        assert!(is_valid_entity_id("Table1"));
        assert!(is_valid_entity_id("_private"));
        assert!(!is_valid_entity_id("1Table"));
        assert!(!is_valid_entity_id("Table.1"));
        assert!(!is_valid_entity_id(""));
    }

    #[test]
    fn node_keys_roundtrip() {
        let path = PropertyPath::parse("data[0].name").unwrap();
        let key = node_key("Query1", &path);
        assert_eq!(key, "Query1.data[0].name");
        let (entity, back) = split_node_key(&key).unwrap();
        assert_eq!(entity, "Query1");
        assert_eq!(back, path);
    }

    #[test]
    fn entity_ref_exposes_kind_and_id() {
        let r = EntityRef::new(EntityKind::Query, "Query1");
        assert_eq!(r.id(), "Query1");
        assert_eq!(r.kind(), EntityKind::Query);
        assert_eq!(r.to_string(), "query:Query1");
    }
}
