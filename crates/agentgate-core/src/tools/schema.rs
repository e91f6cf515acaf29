//! Argument validation against a tool's JSON Schema
//!
//! Covers the subset tool servers actually declare: `type` (single or a list),
//! `required`, and per-property `type` for nested objects and arrays with
//! `items`. Unknown keywords are ignored.

use serde_json::{Map, Value};

/// Validate `value` against `schema`, returning a human-readable reason on failure
pub fn validate(schema: &Value, value: &Value) -> Result<(), String> {
    validate_at("arguments", schema, value)
}

fn validate_at(path: &str, schema: &Value, value: &Value) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        // `true`, `{}` or anything non-object accepts everything.
        return Ok(());
    };

    if let Some(expected) = schema.get("type") {
        if !type_matches(expected, value) {
            return Err(format!(
                "{} must be of type {}, got {}",
                path,
                describe_type(expected),
                type_name(value)
            ));
        }
    }

    match value {
        Value::Object(object) => validate_object(path, schema, object),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (index, item) in items.iter().enumerate() {
                    validate_at(&format!("{}[{}]", path, index), item_schema, item)?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_object(
    path: &str,
    schema: &Map<String, Value>,
    object: &Map<String, Value>,
) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(format!("{} is missing required field '{}'", path, key));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, property_schema) in properties {
            if let Some(property) = object.get(key) {
                validate_at(&format!("{}.{}", path, key), property_schema, property)?;
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => is_type(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| is_type(name, value)),
        _ => true,
    }
}

fn is_type(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        // Unknown type names are not ours to reject.
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
