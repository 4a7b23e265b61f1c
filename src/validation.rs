//! Configuration validation against a [`Schema`].
//!
//! Checks presence of required attributes, value types, nested block counts
//! and the per-attribute [`Validator`]s, producing one diagnostic per problem.
//!
//! # Example
//!
//! ```
//! use terraform_provider_ripe_atlas::schema::{Attribute, Schema};
//! use terraform_provider_ripe_atlas::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("interval", Attribute::optional_computed_int64().between(30, 3600));
//!
//! assert!(validate(&schema, &json!({"interval": 300})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"interval": 5}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("interval".to_string()));
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema, Validator,
};

/// Validate a JSON value against a schema.
///
/// An empty list means the value is valid. Computed-only attributes are not
/// checked, and values the host has not resolved yet (`null`) skip the
/// validators.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            // Validators only make sense on a well-typed value.
            if diagnostics.len() == before {
                for validator in &attr.validators {
                    if let Some(diag) = check_validator(validator, v, path) {
                        diagnostics.push(diag);
                    }
                }
            }
        },
    }
}

fn check_validator(validator: &Validator, value: &Value, path: &str) -> Option<Diagnostic> {
    let detail = match validator {
        Validator::Between { min, max } => {
            let n = as_int64(value)?;
            if n >= *min && n <= *max {
                return None;
            }
            format!("Attribute {} value must be between {} and {}, got: {}", path, min, max, n)
        },
        Validator::OneOf { values } => {
            let s = value.as_str()?;
            if values.iter().any(|v| v == s) {
                return None;
            }
            let quoted: Vec<String> = values.iter().map(|v| format!("{:?}", v)).collect();
            format!(
                "Attribute {} value must be one of: [{}], got: {:?}",
                path,
                quoted.join(" "),
                s
            )
        },
    };
    Some(
        Diagnostic::error("Invalid Attribute Value")
            .with_detail(detail)
            .with_attribute(path),
    )
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if as_int64(value).is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Object(attrs) => match value.as_object() {
            Some(obj) => validate_object_type(attrs, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
    }
}

fn validate_object_type(
    attrs: &BTreeMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None) | (_, Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        (BlockNestingMode::List, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integral JSON numbers, including floats with no fractional part.
pub(crate) fn as_int64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    fn probe_set_schema() -> Schema {
        Schema::v0().with_block(
            "probe_set",
            NestedBlock::list(
                Block::new()
                    .with_attribute("number", Attribute::required_int64().between(1, 50))
                    .with_attribute(
                        "type",
                        Attribute::required_string().one_of(&["area", "country", "asn"]),
                    ),
            )
            .with_min_items(1),
        )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("target", Attribute::required_string());

        assert!(validate(&schema, &json!({"target": "example.net"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("target".to_string()));

        let diagnostics = validate(&schema, &json!({"target": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"target": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("hidden", Attribute::optional_bool());

        assert!(validate(&schema, &json!({"hidden": true})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"hidden": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"hidden": "yes"})).len(), 1);
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("last_updated", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"last_updated": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("packets", Attribute::required_int64());

        assert!(validate(&schema, &json!({"packets": 3})).is_empty());
        assert!(validate(&schema, &json!({"packets": 3.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"packets": 3.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"packets": "3"})).len(), 1);
    }

    #[test]
    fn test_between_validator() {
        let schema = Schema::v0()
            .with_attribute("interval", Attribute::optional_computed_int64().between(30, 3600));

        assert!(validate(&schema, &json!({"interval": 30})).is_empty());
        assert!(validate(&schema, &json!({"interval": 3600})).is_empty());
        assert!(validate(&schema, &json!({"interval": null})).is_empty());

        let diagnostics = validate(&schema, &json!({"interval": 5}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Attribute Value");
        assert_eq!(
            diagnostics[0].detail,
            Some("Attribute interval value must be between 30 and 3600, got: 5".to_string())
        );
    }

    #[test]
    fn test_one_of_validator() {
        let schema = Schema::v0().with_attribute(
            "type",
            Attribute::required_string().one_of(&["ping", "dns"]),
        );

        assert!(validate(&schema, &json!({"type": "dns"})).is_empty());

        let diagnostics = validate(&schema, &json!({"type": "icmp"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("type".to_string()));
        assert_eq!(
            diagnostics[0].detail,
            Some(r#"Attribute type value must be one of: ["ping" "dns"], got: "icmp""#.to_string())
        );
    }

    #[test]
    fn test_validators_skipped_on_type_error() {
        let schema =
            Schema::v0().with_attribute("size", Attribute::required_int64().between(48, 1500));

        let diagnostics = validate(&schema, &json!({"size": "big"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_list_type() {
        let schema = Schema::v0().with_attribute(
            "tags",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::required(),
            ),
        );

        assert!(validate(&schema, &json!({"tags": ["a", "b"]})).is_empty());
        assert!(validate(&schema, &json!({"tags": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": ["a", 123]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1".to_string()));

        assert_eq!(validate(&schema, &json!({"tags": "a"})).len(), 1);
    }

    #[test]
    fn test_validate_object_type() {
        let schema = Schema::v0().with_attribute(
            "probes",
            Attribute::new(
                AttributeType::object([
                    ("requested", AttributeType::Int64),
                    ("scheduled", AttributeType::Int64),
                ]),
                AttributeFlags::required(),
            ),
        );

        assert!(validate(&schema, &json!({"probes": {"requested": 5, "scheduled": 4}})).is_empty());

        let diagnostics = validate(&schema, &json!({"probes": {"requested": "five"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("probes.requested".to_string()));
    }

    #[test]
    fn test_validate_nested_block_list() {
        let schema = probe_set_schema();

        let valid = json!({"probe_set": [{"number": 1, "type": "country"}]});
        assert!(validate(&schema, &valid).is_empty());

        let diagnostics = validate(&schema, &json!({"probe_set": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"probe_set": [{"number": 51, "type": "asn"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("probe_set.0.number".to_string()));

        let diagnostics = validate(&schema, &json!({"probe_set": [{"number": 2, "type": "city"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("probe_set.0.type".to_string()));
    }

    #[test]
    fn test_validate_nested_block_max_items() {
        let schema = Schema::v0().with_block(
            "probe_set",
            NestedBlock::list(Block::new()).with_max_items(2),
        );

        let diagnostics = validate(&schema, &json!({"probe_set": [{}, {}, {}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let diagnostics = validate(&schema, &json!({"probe_set": {}}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_validate_single_block() {
        let schema = Schema::v0().with_block(
            "options",
            NestedBlock::single(Block::new().with_attribute("hidden", Attribute::optional_bool())),
        );

        assert!(validate(&schema, &json!({})).is_empty());
        let diagnostics = validate(&schema, &json!({"options": {"hidden": 1}}));
        assert_eq!(diagnostics[0].attribute, Some("options.hidden".to_string()));
    }

    #[test]
    fn test_validate_multiple_errors() {
        let schema = Schema::v0()
            .with_attribute("description", Attribute::required_string())
            .with_attribute("packets", Attribute::required_int64().between(1, 10))
            .with_attribute("hidden", Attribute::optional_bool());

        let diagnostics = validate(
            &schema,
            &json!({"description": 123, "packets": 11, "hidden": "yes"}),
        );
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("target", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert_eq!(diagnostics[0].attribute, None);
    }
}
