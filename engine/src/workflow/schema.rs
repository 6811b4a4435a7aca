//! Job input/output contracts
//!
//! Supports a small JSON-schema subset: `type`, `required` and `properties`
//! (recursive). Unknown keywords are ignored.

use super::reference::type_name;
use serde_json::Value;

/// Check `value` against `schema`
///
/// Returns a description of the first violation, with a JSON-pointer-like
/// location.
pub fn check(schema: &Value, value: &Value) -> Result<(), String> {
    check_at(schema, value, "$")
}

/// Whether `schema` declares a top-level type other than `string`
///
/// Text produced by an agent is parsed as JSON before checking against such
/// a schema.
pub fn expects_structured(schema: &Value) -> bool {
    match schema.get("type").and_then(Value::as_str) {
        Some(kind) => kind != "string",
        None => false,
    }
}

fn check_at(schema: &Value, value: &Value, at: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(expected, value) {
            return Err(format!(
                "{}: expected {}, got {}",
                at,
                expected,
                type_name(value)
            ));
        }
    }

    let Value::Object(map) = value else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                return Err(format!("{}: missing required property '{}'", at, key));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, sub_schema) in properties {
            if let Some(sub_value) = map.get(key) {
                check_at(sub_schema, sub_value, &format!("{}.{}", at, key))?;
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_checks() {
        assert!(check(&json!({"type": "string"}), &json!("x")).is_ok());
        assert!(check(&json!({"type": "integer"}), &json!(3)).is_ok());
        assert!(check(&json!({"type": "integer"}), &json!(3.5)).is_err());
        assert!(check(&json!({"type": "number"}), &json!(3.5)).is_ok());
        assert!(check(&json!({"type": "null"}), &json!(null)).is_ok());
        assert!(check(&json!({}), &json!([1, 2])).is_ok());
    }

    #[test]
    fn test_required_and_nested_properties() {
        let schema = json!({
            "type": "object",
            "required": ["title"],
            "properties": {
                "title": {"type": "string"},
                "meta": {
                    "type": "object",
                    "properties": {"words": {"type": "integer"}}
                }
            }
        });

        assert!(check(&schema, &json!({"title": "Hi", "meta": {"words": 3}})).is_ok());

        let err = check(&schema, &json!({"meta": {}})).unwrap_err();
        assert!(err.contains("title"));

        let err = check(&schema, &json!({"title": "Hi", "meta": {"words": "many"}})).unwrap_err();
        assert_eq!(err, "$.meta.words: expected integer, got string");
    }

    #[test]
    fn test_expects_structured() {
        assert!(expects_structured(&json!({"type": "object"})));
        assert!(!expects_structured(&json!({"type": "string"})));
        assert!(!expects_structured(&json!({"required": ["x"]})));
    }
}
