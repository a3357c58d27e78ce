use log::*;
use serde_json::Value;

/// `true` if every field present in `part` has the same value in `complete`. Arrays must match element for element.
pub fn json_is_subset_of(part: &str, complete: &str) -> bool {
    let part: Value = serde_json::from_str(part).expect("Invalid JSON");
    let complete: Value = serde_json::from_str(complete).expect("Invalid JSON");
    value_is_subset_of(&part, &complete)
}

pub fn value_is_subset_of(part: &Value, complete: &Value) -> bool {
    match (part, complete) {
        (Value::Null, _) => true,
        (Value::Object(fields), _) => fields.iter().all(|(key, value)| match complete.get(key) {
            Some(v) if value_is_subset_of(value, v) => true,
            Some(v) => {
                error!("Value mismatch for {key}: {value} != {v}");
                false
            },
            None => {
                error!("Key not found: {key}");
                false
            },
        }),
        (Value::Array(p), Value::Array(c)) => {
            if p.len() != c.len() {
                error!("Array length mismatch: {} != {}", p.len(), c.len());
                return false;
            }
            p.iter().zip(c.iter()).all(|(p, c)| value_is_subset_of(p, c))
        },
        (Value::Array(_), _) => {
            error!("Expected an array, but got {complete}");
            false
        },
        _ => part == complete,
    }
}
