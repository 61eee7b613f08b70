//! Deriving command-line parameters from input schemas
//!
//! Every procedure is reachable from the command line without hand-written
//! argument parsing. [`CliShape::from_schema`] partitions the schema into
//! positionals and `--flags`; [`CliShape::assemble`] turns collected
//! arguments back into one input object. Required-field checks are left to
//! the router so every transport reports them the same way.

use crate::schema::{FieldKind, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can only be detected while placing CLI arguments
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliUsageError {
    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// One parameter of a materialized command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliParam {
    /// Field name in the input object
    pub name: String,
    /// Flag spelling without the leading dashes
    pub flag: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CliParam {
    /// Help text line for this parameter
    pub fn help(&self) -> String {
        let mut text = self.description.clone().unwrap_or_default();
        if text.is_empty() {
            text = self.kind.as_str().to_string();
        } else {
            text = format!("{} ({})", text, self.kind.as_str());
        }
        if self.required {
            text.push_str(" [required]");
        }
        text
    }
}

/// Positional/flag partition of an input schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliShape {
    pub positionals: Vec<CliParam>,
    pub options: Vec<CliParam>,
}

impl CliShape {
    /// Partition a schema into positionals and options
    ///
    /// The first required string/number/integer field is the primary
    /// identifier and becomes the only positional. Everything else is a
    /// flag, in schema order.
    pub fn from_schema(schema: &Schema) -> Self {
        let primary = schema
            .fields()
            .iter()
            .position(|f| f.required && f.kind.is_scalar());

        let mut shape = CliShape::default();
        for (index, spec) in schema.fields().iter().enumerate() {
            let param = CliParam {
                name: spec.name.clone(),
                flag: flag_name(&spec.name),
                kind: spec.kind,
                required: spec.required,
                description: spec.description.clone(),
            };
            if Some(index) == primary {
                shape.positionals.push(param);
            } else {
                shape.options.push(param);
            }
        }
        shape
    }

    /// Look up an option by flag spelling or field name
    pub fn option(&self, flag: &str) -> Option<&CliParam> {
        self.options
            .iter()
            .chain(self.positionals.iter())
            .find(|p| p.flag == flag || p.name == flag)
    }

    /// Rebuild the input object from collected arguments
    ///
    /// `options` holds `(flag, value)` pairs; a missing value marks a bare
    /// switch. Values that cannot be coerced to the field kind are kept as
    /// strings, and unknown flags are passed through, so schema validation
    /// reports both.
    pub fn assemble(
        &self,
        positionals: &[String],
        options: &[(String, Option<String>)],
    ) -> Result<Value, CliUsageError> {
        let mut input = Map::new();

        if positionals.len() > self.positionals.len() {
            return Err(CliUsageError::UnexpectedArgument(
                positionals[self.positionals.len()].clone(),
            ));
        }
        for (param, raw) in self.positionals.iter().zip(positionals) {
            input.insert(param.name.clone(), coerce(param.kind, raw));
        }

        for (flag, raw) in options {
            let (name, kind) = match self.option(flag) {
                Some(param) => (param.name.clone(), param.kind),
                None => (flag.clone(), FieldKind::Any),
            };
            let value = match raw {
                None => Value::Bool(true),
                Some(raw) => coerce(kind, raw),
            };
            if kind == FieldKind::Array && !value.is_array() {
                match input.get_mut(&name) {
                    Some(Value::Array(items)) => items.push(value),
                    _ => {
                        input.insert(name, Value::Array(vec![value]));
                    }
                }
            } else {
                input.insert(name, value);
            }
        }

        Ok(Value::Object(input))
    }
}

/// Convert a field name to its kebab-case flag spelling
///
/// `repoName`, `repo_name` and `repo-name` all become `repo-name`.
pub fn flag_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for ch in field.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Coerce a raw CLI token to the JSON value a field kind expects
pub fn coerce(kind: FieldKind, raw: &str) -> Value {
    let keep = || Value::String(raw.to_string());
    match kind {
        FieldKind::String => keep(),
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| keep()),
        FieldKind::Number => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::from(n)
            } else {
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(keep)
            }
        }
        FieldKind::Boolean => match raw {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => keep(),
        },
        FieldKind::Array => match serde_json::from_str::<Value>(raw) {
            Ok(v @ Value::Array(_)) => v,
            _ => keep(),
        },
        FieldKind::Object => match serde_json::from_str::<Value>(raw) {
            Ok(v @ Value::Object(_)) => v,
            _ => keep(),
        },
        FieldKind::Any => serde_json::from_str(raw).unwrap_or_else(|_| keep()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn issue_schema() -> Schema {
        Schema::object()
            .field(FieldSpec::boolean("verbose").required())
            .field(FieldSpec::string("title").required().describe("Issue title"))
            .field(FieldSpec::string("body"))
            .field(FieldSpec::integer("priority").required())
            .field(FieldSpec::array("labels"))
    }

    #[test]
    fn test_first_required_scalar_is_positional() {
        let shape = CliShape::from_schema(&issue_schema());
        let positional: Vec<_> = shape.positionals.iter().map(|p| p.name.as_str()).collect();
        let options: Vec<_> = shape.options.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(positional, vec!["title"]);
        assert_eq!(options, vec!["verbose", "body", "priority", "labels"]);
    }

    #[test]
    fn test_no_required_fields_means_no_positionals() {
        let schema = Schema::object().field(FieldSpec::string("state"));
        let shape = CliShape::from_schema(&schema);
        assert!(shape.positionals.is_empty());
        assert_eq!(shape.options.len(), 1);
    }

    #[test]
    fn test_assemble_coerces_by_kind() {
        let shape = CliShape::from_schema(&issue_schema());
        let input = shape
            .assemble(
                &["Crash on start".to_string()],
                &[
                    ("priority".to_string(), Some("2".to_string())),
                    ("verbose".to_string(), None),
                    ("labels".to_string(), Some("bug".to_string())),
                    ("labels".to_string(), Some("p1".to_string())),
                ],
            )
            .unwrap();
        assert_eq!(
            input,
            json!({
                "title": "Crash on start",
                "priority": 2,
                "verbose": true,
                "labels": ["bug", "p1"],
            })
        );
    }

    #[test]
    fn test_assemble_keeps_uncoercible_values_for_validation() {
        let shape = CliShape::from_schema(&issue_schema());
        let input = shape
            .assemble(&[], &[("priority".to_string(), Some("high".to_string()))])
            .unwrap();
        assert_eq!(input, json!({"priority": "high"}));
        assert!(issue_schema().validate(&input).is_err());
    }

    #[test]
    fn test_assemble_rejects_surplus_positionals() {
        let shape = CliShape::from_schema(&issue_schema());
        let err = shape
            .assemble(&["a".to_string(), "b".to_string()], &[])
            .unwrap_err();
        assert_eq!(err, CliUsageError::UnexpectedArgument("b".to_string()));
    }

    #[test]
    fn test_unknown_flags_pass_through() {
        let shape = CliShape::from_schema(&issue_schema());
        let input = shape
            .assemble(&[], &[("colour".to_string(), Some("\"red\"".to_string()))])
            .unwrap();
        assert_eq!(input, json!({"colour": "red"}));
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(flag_name("repoName"), "repo-name");
        assert_eq!(flag_name("repo_name"), "repo-name");
        assert_eq!(flag_name("dryRun"), "dry-run");
        assert_eq!(flag_name("id"), "id");
        assert_eq!(flag_name("v2Api"), "v2-api");
    }

    #[test]
    fn test_camel_case_flag_maps_back_to_field() {
        let schema = Schema::object().field(FieldSpec::boolean("dryRun"));
        let shape = CliShape::from_schema(&schema);
        let input = shape
            .assemble(&[], &[("dry-run".to_string(), Some("false".to_string()))])
            .unwrap();
        assert_eq!(input, json!({"dryRun": false}));
    }
}
