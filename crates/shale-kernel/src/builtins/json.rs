//! Conversions between runtime values and JSON.
//!
//! Backs `string.toJson` / `string.fromJson`. Functions, namespaces,
//! and the absence marker have no JSON form and render as null;
//! properties convert through their current content.

use std::collections::BTreeMap;

use crate::runtime::value::Value;

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Dec(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        Value::Object(entries) => serde_json::Value::Object(
            entries.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect(),
        ),
        Value::Property(cell) => value_to_json(&cell.borrow().get()),
        Value::Function(_) | Value::Namespace(_) | Value::Null | Value::None => {
            serde_json::Value::Null
        }
    }
}

pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Dec(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let map: BTreeMap<String, Value> =
                entries.into_iter().map(|(k, v)| (k, json_to_value(v))).collect();
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scalars() {
        for v in [Value::Int(5), Value::Str("x".into()), Value::Bool(true), Value::Null] {
            assert_eq!(json_to_value(value_to_json(&v)), v);
        }
    }

    #[test]
    fn nested_structures_convert() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a": [1, 2.5], "b": null}"#).unwrap();
        let value = json_to_value(json.clone());
        match &value {
            Value::Object(entries) => {
                assert_eq!(
                    entries.get("a"),
                    Some(&Value::Array(vec![Value::Int(1), Value::Dec(2.5)]))
                );
                assert_eq!(entries.get("b"), Some(&Value::Null));
            }
            other => panic!("expected object, got {other:?}"),
        }
        assert_eq!(value_to_json(&value), json);
    }

    #[test]
    fn integers_stay_integers() {
        assert_eq!(json_to_value(serde_json::Value::from(7_i64)), Value::Int(7));
    }
}
