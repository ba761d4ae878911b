//! Schema Validator.
//!
//! Checks a parsed request payload against a declarative schema in a fixed
//! phase order: required fields (dotted paths address nested objects), nested
//! object recursion, per-property type and enum checks, then `allOf`
//! conditional rules. The first violated rule fails the request; the error
//! carries the rejected payload and the schema for debuggability.

use crate::config::Schema;
use crate::error::Error;
use serde_json::Value;

/// Validate `payload` against `schema`. Returns normally when valid.
pub fn validate(payload: &Value, schema: &Schema) -> Result<(), Error> {
    check(payload, schema).map_err(|message| Error::Validation {
        message,
        received: payload.clone(),
        expected: schema.to_value(),
    })
}

fn check(payload: &Value, schema: &Schema) -> Result<(), String> {
    check_required(payload, &schema.required)?;
    check_nested(payload, schema)?;
    check_types(payload, schema)?;
    check_conditionals(payload, schema)?;
    Ok(())
}

/// Phase 1: required fields, where "parent.child" requires `payload[parent]`
/// to exist, be an object, and contain `child`.
fn check_required(payload: &Value, required: &[String]) -> Result<(), String> {
    for field in required {
        let mut current = payload;
        for (depth, segment) in field.split('.').enumerate() {
            let object = current
                .as_object()
                .ok_or_else(|| missing_message(field, depth))?;
            current = object
                .get(segment)
                .ok_or_else(|| missing_message(field, depth))?;
        }
    }
    Ok(())
}

fn missing_message(field: &str, depth: usize) -> String {
    if depth == 0 {
        format!("missing required field: {field}")
    } else {
        format!("missing required nested field: {field}")
    }
}

/// Phase 2: recurse into every property that is both a nested object in the
/// payload and declares sub-properties in the schema.
fn check_nested(payload: &Value, schema: &Schema) -> Result<(), String> {
    let Some(object) = payload.as_object() else {
        return Ok(());
    };
    for (name, sub_schema) in &schema.properties {
        if sub_schema.properties.is_empty() {
            continue;
        }
        if let Some(nested @ Value::Object(_)) = object.get(name) {
            check(nested, sub_schema).map_err(|e| format!("{name}: {e}"))?;
        }
    }
    Ok(())
}

/// Phase 3: fixed type vocabulary plus enum membership.
fn check_types(payload: &Value, schema: &Schema) -> Result<(), String> {
    let Some(object) = payload.as_object() else {
        return Ok(());
    };
    for (field, value) in object {
        let Some(property) = schema.properties.get(field) else {
            continue;
        };
        if let Some(declared) = property.schema_type.as_deref() {
            if !type_matches(declared, value) {
                return Err(format!(
                    "invalid type for {field}: expected {declared}, got {}",
                    type_name(value)
                ));
            }
        }
        if let Some(allowed) = &property.enum_values {
            if !allowed.contains(value) {
                return Err(format!(
                    "invalid value for {field}: {value}. Allowed values: {}",
                    serde_json::to_string(allowed).unwrap_or_default()
                ));
            }
        }
    }
    Ok(())
}

fn type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "str" | "string" => value.is_string(),
        // Accepts a value that is already numeric or a digit-only string.
        "int" | "integer" => {
            value.is_i64()
                || value.is_u64()
                || value
                    .as_str()
                    .map(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
        }
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        // Unknown declared types do not reject; the vocabulary is fixed but
        // foreign declarations pass through.
        _ => true,
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

/// Phase 4: `allOf` rules. The `if` clause is a conjunction of field == const
/// comparisons over the top-level payload; when satisfied, the `then.required`
/// fields must all be present.
fn check_conditionals(payload: &Value, schema: &Schema) -> Result<(), String> {
    let empty = serde_json::Map::new();
    let object = payload.as_object().unwrap_or(&empty);
    for rule in &schema.all_of {
        let satisfied = rule
            .if_clause
            .properties
            .iter()
            .all(|(field, expected)| object.get(field) == Some(&expected.const_value));
        if !satisfied {
            continue;
        }
        for field in &rule.then_clause.required {
            if !object.contains_key(field) {
                let condition = rule
                    .if_clause
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.const_value))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(format!(
                    "missing required field {field} when {condition}"
                ));
            }
        }
    }
    Ok(())
}
