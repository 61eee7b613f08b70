//! Field descriptors shared by input validation and CLI generation
//!
//! A [`Schema`] is a flat list of [`FieldSpec`]s describing a JSON object.
//! The validator and the CLI materializer both read from it, so how a
//! field is checked and how it is exposed as a flag never drift apart.

use crate::error::FieldIssue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldKind {
    /// Check a JSON value against this kind
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
        }
    }

    /// Whether this kind can be passed as a bare CLI token
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Number | FieldKind::Integer
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Any => "any",
        }
    }
}

/// Descriptor for a single field of an object schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as it appears in the input object
    pub name: String,
    /// Expected value kind
    pub kind: FieldKind,
    /// Whether the field must be present and non-null
    #[serde(default)]
    pub required: bool,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value applied when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Array)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Object)
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Structural validator for procedure inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schema {
    /// An object with the listed fields
    Object {
        fields: Vec<FieldSpec>,
        #[serde(default)]
        allow_unknown: bool,
    },
    /// Any JSON value
    Any,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::object()
    }
}

impl Schema {
    /// An object schema with no fields
    pub fn object() -> Self {
        Schema::Object {
            fields: Vec::new(),
            allow_unknown: false,
        }
    }

    /// A schema accepting every value
    pub fn any() -> Self {
        Schema::Any
    }

    /// Add a field (no-op for [`Schema::Any`])
    pub fn field(mut self, spec: FieldSpec) -> Self {
        if let Schema::Object { fields, .. } = &mut self {
            fields.push(spec);
        }
        self
    }

    /// Accept fields not listed in the schema
    pub fn allow_unknown(mut self) -> Self {
        if let Schema::Object { allow_unknown, .. } = &mut self {
            *allow_unknown = true;
        }
        self
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        match self {
            Schema::Object { fields, .. } => fields,
            Schema::Any => &[],
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Validate a value, collecting every issue found
    ///
    /// `null` is treated as an empty object so procedures without
    /// required fields can be called with no input at all.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<FieldIssue>> {
        let (fields, allow_unknown) = match self {
            Schema::Any => return Ok(()),
            Schema::Object {
                fields,
                allow_unknown,
            } => (fields, *allow_unknown),
        };

        let empty = serde_json::Map::new();
        let object = match value {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(vec![FieldIssue::new(
                    "",
                    format!("expected an object, got {}", json_type_name(other)),
                )]);
            }
        };

        let mut issues = Vec::new();
        for spec in fields {
            match object.get(&spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        issues.push(FieldIssue::new(&spec.name, "is required"));
                    }
                }
                Some(v) if !spec.kind.accepts(v) => {
                    issues.push(FieldIssue::new(
                        &spec.name,
                        format!("expected {}, got {}", spec.kind.as_str(), json_type_name(v)),
                    ));
                }
                Some(_) => {}
            }
        }

        if !allow_unknown {
            for key in object.keys() {
                if !fields.iter().any(|f| &f.name == key) {
                    issues.push(FieldIssue::new(key, "unknown field"));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Fill absent fields that declare a default
    pub fn apply_defaults(&self, value: Value) -> Value {
        let mut map = match value {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => return other,
        };
        for spec in self.fields() {
            if let Some(default) = &spec.default {
                let missing = map.get(&spec.name).is_none_or(Value::is_null);
                if missing {
                    map.insert(spec.name.clone(), default.clone());
                }
            }
        }
        if map.is_empty() && matches!(self, Schema::Any) {
            return Value::Null;
        }
        Value::Object(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pr_schema() -> Schema {
        Schema::object()
            .field(FieldSpec::integer("number").required().describe("Pull request number"))
            .field(FieldSpec::string("repo"))
            .field(FieldSpec::boolean("draft"))
    }

    #[test]
    fn test_valid_input() {
        assert!(pr_schema().validate(&json!({"number": 7, "repo": "a/b"})).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let issues = pr_schema().validate(&json!({})).unwrap_err();
        assert_eq!(issues, vec![FieldIssue::new("number", "is required")]);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let issues = pr_schema().validate(&json!({"number": null})).unwrap_err();
        assert_eq!(issues[0].message, "is required");
    }

    #[test]
    fn test_wrong_kind_and_unknown_field() {
        let issues = pr_schema()
            .validate(&json!({"number": "7", "colour": "red"}))
            .unwrap_err();
        assert_eq!(
            issues,
            vec![
                FieldIssue::new("number", "expected integer, got string"),
                FieldIssue::new("colour", "unknown field"),
            ]
        );
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let issues = pr_schema().validate(&json!({"number": 1.5})).unwrap_err();
        assert_eq!(issues[0].message, "expected integer, got number");
    }

    #[test]
    fn test_null_input_is_empty_object() {
        let schema = Schema::object().field(FieldSpec::string("state"));
        assert!(schema.validate(&Value::Null).is_ok());
        assert!(pr_schema().validate(&Value::Null).is_err());
    }

    #[test]
    fn test_non_object_input() {
        let issues = pr_schema().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(issues, vec![FieldIssue::new("", "expected an object, got array")]);
    }

    #[test]
    fn test_allow_unknown_and_any() {
        let schema = Schema::object().allow_unknown();
        assert!(schema.validate(&json!({"whatever": 1})).is_ok());
        assert!(Schema::any().validate(&json!("text")).is_ok());
    }

    #[test]
    fn test_apply_defaults() {
        let schema = Schema::object()
            .field(FieldSpec::integer("limit").with_default(json!(30)))
            .field(FieldSpec::string("state"));
        let filled = schema.apply_defaults(json!({"state": "open"}));
        assert_eq!(filled, json!({"state": "open", "limit": 30}));
        assert_eq!(schema.apply_defaults(Value::Null), json!({"limit": 30}));
    }
}
