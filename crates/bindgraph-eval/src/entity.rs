//! Per-entity store of raw (unevaluated) values.

use std::collections::BTreeMap;

use bindgraph_common::{EntityKind, EntityRef, PathError, PropertyPath, is_valid_entity_id};
use bindgraph_parse::is_dynamic;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::EngineError;
use crate::schema::{PropertySchema, SchemaValidator};

/// How a host describes an entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// May be omitted when the config is keyed by id in an enclosing map.
    #[serde(default)]
    pub id: String,
    #[serde(default = "empty_object")]
    pub values: JsonValue,
    #[serde(default)]
    pub evaluable_paths: Vec<PropertyPath>,
    #[serde(default)]
    pub schema: BTreeMap<PropertyPath, PropertySchema>,
    #[serde(default)]
    pub actions: Vec<String>,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl EntityConfig {
    pub fn new(id: impl Into<String>, values: JsonValue) -> Self {
        Self {
            id: id.into(),
            values,
            ..Self::default()
        }
    }

    pub fn evaluable(mut self, path: &str) -> Result<Self, PathError> {
        self.evaluable_paths.push(PropertyPath::parse(path)?);
        Ok(self)
    }

    pub fn with_schema(mut self, path: &str, schema: PropertySchema) -> Result<Self, PathError> {
        self.schema.insert(PropertyPath::parse(path)?, schema);
        Ok(self)
    }

    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }
}

/// The shared view every entity kind exposes to the dependency layer.
pub trait ValueStore {
    fn id(&self) -> &str;

    fn uneval_values(&self) -> &JsonValue;

    /// Concrete evaluable paths: `[*]` patterns expanded against the current
    /// values, and arrays of code expanded per index.
    fn evaluable_paths(&self) -> Vec<PropertyPath>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    reference: EntityRef,
    values: JsonValue,
    patterns: Vec<PropertyPath>,
    schema: Vec<(PropertyPath, SchemaValidator)>,
    actions: Vec<String>,
}

impl Entity {
    pub fn new(kind: EntityKind, config: EntityConfig) -> Result<Self, EngineError> {
        if !is_valid_entity_id(&config.id) {
            return Err(EngineError::InvalidEntityId(config.id));
        }
        if !config.values.is_object() {
            return Err(EngineError::ValuesNotObject(config.id));
        }
        let mut patterns = config.evaluable_paths;
        patterns.sort();
        patterns.dedup();
        let schema = config
            .schema
            .into_iter()
            .map(|(path, schema)| match schema.compile() {
                Ok(validator) => Ok((path, validator)),
                Err(message) => Err(EngineError::InvalidSchema {
                    entity: config.id.clone(),
                    path: path.to_string(),
                    message,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            reference: EntityRef::new(kind, config.id),
            values: config.values,
            patterns,
            schema,
            actions: config.actions,
        })
    }

    pub fn reference(&self) -> &EntityRef {
        &self.reference
    }

    pub fn kind(&self) -> EntityKind {
        self.reference.kind()
    }

    pub fn patterns(&self) -> &[PropertyPath] {
        &self.patterns
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a == name)
    }

    pub fn get(&self, path: &PropertyPath) -> Option<&JsonValue> {
        path.get(&self.values)
    }

    pub fn set_value(&mut self, path: &PropertyPath, value: JsonValue) -> Result<(), PathError> {
        if path.is_root() {
            if !value.is_object() {
                return Err(PathError::Empty);
            }
            self.values = value;
            return Ok(());
        }
        path.set(&mut self.values, value)
    }

    /// Validator for a concrete path; `[*]` schema keys match every index.
    pub fn validator(&self, path: &PropertyPath) -> Option<&SchemaValidator> {
        self.schema
            .iter()
            .find(|(pattern, _)| path == pattern || path.matches(pattern))
            .map(|(_, schema)| schema)
    }

    /// Top-level keys of the raw value tree.
    pub fn top_level_paths(&self) -> Vec<PropertyPath> {
        match &self.values {
            JsonValue::Object(map) => map.keys().map(PropertyPath::key).collect(),
            _ => Vec::new(),
        }
    }

    /// True when the raw value at `path` contains at least one binding.
    pub fn is_code(&self, path: &PropertyPath) -> bool {
        self.get(path).is_some_and(contains_binding)
    }

    pub fn to_config(&self) -> EntityConfig {
        EntityConfig {
            id: self.reference.id().to_string(),
            values: self.values.clone(),
            evaluable_paths: self.patterns.clone(),
            schema: self
                .schema
                .iter()
                .map(|(path, validator)| (path.clone(), validator.schema().clone()))
                .collect(),
            actions: self.actions.clone(),
        }
    }
}

impl ValueStore for Entity {
    fn id(&self) -> &str {
        self.reference.id()
    }

    fn uneval_values(&self) -> &JsonValue {
        &self.values
    }

    fn evaluable_paths(&self) -> Vec<PropertyPath> {
        let mut out = Vec::new();
        for pattern in &self.patterns {
            for concrete in pattern.expand(&self.values) {
                let value = concrete.get(&self.values);
                expand_code_arrays(concrete, value, &mut out);
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

fn contains_binding(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(s) => is_dynamic(s),
        JsonValue::Array(items) => items.iter().any(contains_binding),
        _ => false,
    }
}

fn contains_string(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(_) => true,
        JsonValue::Array(items) => items.iter().any(contains_string),
        _ => false,
    }
}

/// Arrays holding strings become one path per element, recursively, so the
/// same rule applies to each element independently.
fn expand_code_arrays(path: PropertyPath, value: Option<&JsonValue>, out: &mut Vec<PropertyPath>) {
    match value {
        Some(JsonValue::Array(items)) if items.iter().any(contains_string) => {
            for (i, item) in items.iter().enumerate() {
                expand_code_arrays(path.child_index(i), Some(item), out);
            }
        }
        _ => out.push(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> PropertyPath {
        PropertyPath::parse(s).unwrap()
    }

    fn table() -> Entity {
        let config = EntityConfig::new(
            "Table1",
            json!({
                "data": "{{Query1.data}}",
                "columns": [{"label": "{{'A'}}"}, {"label": "B"}],
                "onRowClick": ["{{Api1.run()}}", "{{Api2.run()}}"],
                "pageSize": 10
            }),
        )
        .evaluable("data")
        .unwrap()
        .evaluable("columns[*].label")
        .unwrap()
        .evaluable("onRowClick")
        .unwrap()
        .evaluable("pageSize")
        .unwrap();
        Entity::new(EntityKind::Widget, config).unwrap()
    }

    #[test]
    fn evaluable_paths_expand_wildcards_and_code_arrays() {
        let paths: Vec<String> = table()
            .evaluable_paths()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "columns[0].label",
                "columns[1].label",
                "data",
                "onRowClick[0]",
                "onRowClick[1]",
                "pageSize"
            ]
        );
    }

    #[test]
    fn code_detection() {
        let entity = table();
        assert!(entity.is_code(&p("data")));
        assert!(entity.is_code(&p("columns[0].label")));
        assert!(!entity.is_code(&p("columns[1].label")));
        assert!(!entity.is_code(&p("pageSize")));
        assert!(!entity.is_code(&p("missing")));
    }

    #[test]
    fn invalid_ids_and_values_are_rejected() {
        let bad_id = EntityConfig::new("1abc", json!({}));
        assert_eq!(
            Entity::new(EntityKind::Widget, bad_id),
            Err(EngineError::InvalidEntityId("1abc".into()))
        );
        let bad_values = EntityConfig::new("W", json!([1]));
        assert!(matches!(
            Entity::new(EntityKind::Widget, bad_values),
            Err(EngineError::ValuesNotObject(_))
        ));
    }

    #[test]
    fn set_value_and_validator_lookup() {
        let mut entity = Entity::new(
            EntityKind::Widget,
            EntityConfig::new("List1", json!({"items": []}))
                .with_schema("items[*].n", PropertySchema::default())
                .unwrap(),
        )
        .unwrap();
        entity.set_value(&p("items[1].n"), json!(2)).unwrap();
        assert_eq!(entity.get(&p("items[1].n")), Some(&json!(2)));
        assert!(entity.validator(&p("items[4].n")).is_some());
        assert!(entity.validator(&p("items")).is_none());
    }

    #[test]
    fn schemas_compile_with_the_entity() {
        let config = EntityConfig::new("W", json!({"n": "{{1}}"}))
            .with_schema("n", PropertySchema::new(json!({"type": "number", "default": 3})))
            .unwrap();
        let entity = Entity::new(EntityKind::Widget, config.clone()).unwrap();
        assert_eq!(entity.validator(&p("n")).unwrap().default_value(), json!(3));
        assert_eq!(entity.to_config(), config);

        let broken = EntityConfig::new("W", json!({}))
            .with_schema("n", PropertySchema::new(json!({"type": "decimal"})))
            .unwrap();
        assert!(matches!(
            Entity::new(EntityKind::Widget, broken),
            Err(EngineError::InvalidSchema { entity, path, .. }) if entity == "W" && path == "n"
        ));
    }
}
