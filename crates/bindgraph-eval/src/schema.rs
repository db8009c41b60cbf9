//! Per-path validators for evaluated values.
//!
//! A property schema is a JSON Schema document. It is compiled once when the
//! owning entity is built and applied to every evaluated value of the paths it
//! covers.

use std::fmt;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Shorthand for the `type` keyword when building schemas in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl SchemaType {
    fn keyword(self) -> Option<&'static str> {
        match self {
            SchemaType::String => Some("string"),
            SchemaType::Number => Some("number"),
            SchemaType::Integer => Some("integer"),
            SchemaType::Boolean => Some("boolean"),
            SchemaType::Array => Some("array"),
            SchemaType::Object => Some("object"),
            SchemaType::Any => None,
        }
    }
}

/// Declared shape of one evaluable property, as a JSON Schema document.
///
/// Besides the standard keywords, `default` supplies the value substituted on
/// failure and `nullable: true` lets `null` through unchecked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySchema(JsonValue);

impl Default for PropertySchema {
    fn default() -> Self {
        Self(JsonValue::Object(Map::new()))
    }
}

impl PropertySchema {
    pub fn new(document: JsonValue) -> Self {
        Self(document)
    }

    pub fn of(kind: SchemaType) -> Self {
        let mut schema = Self::default();
        if let Some(keyword) = kind.keyword() {
            schema.set("type", JsonValue::from(keyword));
        }
        schema
    }

    pub fn with_default(mut self, value: JsonValue) -> Self {
        self.set("default", value);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.set("nullable", JsonValue::Bool(true));
        self
    }

    fn set(&mut self, keyword: &str, value: JsonValue) {
        if let JsonValue::Object(map) = &mut self.0 {
            map.insert(keyword.to_string(), value);
        }
    }

    pub fn document(&self) -> &JsonValue {
        &self.0
    }

    pub fn is_nullable(&self) -> bool {
        self.0.get("nullable").and_then(JsonValue::as_bool) == Some(true)
    }

    /// The value substituted when validation fails: the `default` keyword, or
    /// the zero value of the first non-null declared type.
    pub fn default_value(&self) -> JsonValue {
        match self.0.get("default") {
            Some(value) => value.clone(),
            None => zero_of(self.0.get("type")),
        }
    }

    pub fn compile(&self) -> Result<SchemaValidator, String> {
        let compiled = JSONSchema::compile(&self.0).map_err(|err| err.to_string())?;
        Ok(SchemaValidator {
            schema: self.clone(),
            compiled: Arc::new(compiled),
        })
    }
}

fn zero_of(kind: Option<&JsonValue>) -> JsonValue {
    let name = match kind {
        Some(JsonValue::String(name)) => Some(name.as_str()),
        Some(JsonValue::Array(names)) => names
            .iter()
            .filter_map(JsonValue::as_str)
            .find(|name| *name != "null"),
        _ => None,
    };
    match name {
        Some("string") => JsonValue::String(String::new()),
        Some("number" | "integer") => JsonValue::from(0),
        Some("boolean") => JsonValue::Bool(false),
        Some("array") => JsonValue::Array(Vec::new()),
        Some("object") => JsonValue::Object(Map::new()),
        _ => JsonValue::Null,
    }
}

/// A compiled [`PropertySchema`].
#[derive(Clone)]
pub struct SchemaValidator {
    schema: PropertySchema,
    compiled: Arc<JSONSchema>,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema.0)
            .finish()
    }
}

impl PartialEq for SchemaValidator {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
    }
}

impl SchemaValidator {
    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    pub fn default_value(&self) -> JsonValue {
        self.schema.default_value()
    }

    /// Validate `value`, returning every violation found.
    pub fn validate(&self, value: &JsonValue) -> Result<(), Vec<String>> {
        if value.is_null() && self.schema.is_nullable() {
            return Ok(());
        }
        self.compiled
            .validate(value)
            .map_err(|errors| errors.map(|err| err.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compiled(document: JsonValue) -> SchemaValidator {
        PropertySchema::new(document).compile().unwrap()
    }

    #[test]
    fn type_mismatch_reports_and_defaults() {
        let validator = PropertySchema::of(SchemaType::Number)
            .with_default(json!(10))
            .compile()
            .unwrap();
        let errors = validator.validate(&json!("ten")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("number"), "{errors:?}");
        assert_eq!(validator.default_value(), json!(10));
        assert!(validator.validate(&json!(4.5)).is_ok());
    }

    #[test]
    fn integer_rejects_fractions() {
        let validator = PropertySchema::of(SchemaType::Integer).compile().unwrap();
        assert!(validator.validate(&json!(3)).is_ok());
        assert!(validator.validate(&json!(3.5)).is_err());
    }

    #[test]
    fn enum_bounds_and_items() {
        let list = compiled(json!({
            "type": "array",
            "items": { "type": "number", "minimum": 0, "maximum": 5 }
        }));
        assert!(list.validate(&json!([0, 5])).is_ok());
        assert_eq!(list.validate(&json!([1, 9, "x"])).unwrap_err().len(), 2);

        let choice = compiled(json!({"type": "string", "enum": ["a", "b"]}));
        assert!(choice.validate(&json!("a")).is_ok());
        assert!(choice.validate(&json!("c")).is_err());
    }

    #[test]
    fn nullable_and_zero_defaults() {
        let validator = PropertySchema::of(SchemaType::String)
            .nullable()
            .compile()
            .unwrap();
        assert!(validator.validate(&JsonValue::Null).is_ok());
        assert!(validator.validate(&json!(1)).is_err());
        assert_eq!(PropertySchema::of(SchemaType::Array).default_value(), json!([]));
        assert_eq!(
            PropertySchema::new(json!({"type": ["null", "boolean"]})).default_value(),
            json!(false)
        );
        let any = PropertySchema::of(SchemaType::Any).compile().unwrap();
        assert!(any.validate(&json!({"x": 1})).is_ok());
        assert_eq!(any.default_value(), JsonValue::Null);
    }

    #[test]
    fn schema_documents_round_trip_through_serde() {
        let schema: PropertySchema =
            serde_json::from_value(json!({"type": "number", "default": 0})).unwrap();
        assert_eq!(schema, PropertySchema::of(SchemaType::Number).with_default(json!(0)));
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"type": "number", "default": 0})
        );
    }

    #[test]
    fn malformed_schema_does_not_compile() {
        assert!(PropertySchema::new(json!({"type": 12})).compile().is_err());
        assert!(PropertySchema::new(json!({"type": "decimal"})).compile().is_err());
    }
}
