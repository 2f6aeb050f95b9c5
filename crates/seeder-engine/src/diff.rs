//! Field-wise comparison of desired and observed objects
//!
//! Only fields present in the desired object are compared, so unnamed
//! server-side fields never produce a patch. Nested maps (extra specs,
//! metadata, domain configuration) are compared key by key the same way,
//! and lists compare as multisets.

use serde_json::{Map, Value};

/// Desired fields whose value differs from the observed object
///
/// Nested maps contribute only their differing keys.
pub fn patch(desired: &Map<String, Value>, observed: &Map<String, Value>) -> Map<String, Value> {
    desired
        .iter()
        .filter_map(|(field, want)| {
            differs(want, observed.get(field)).map(|value| (field.clone(), value))
        })
        .collect()
}

/// The value to send when `want` differs from `have`
pub fn differs(want: &Value, have: Option<&Value>) -> Option<Value> {
    match (want, have) {
        (Value::Null, None | Some(Value::Null)) => None,
        (Value::Object(want), Some(Value::Object(have))) => {
            let sub = patch(want, have);
            if sub.is_empty() {
                None
            } else {
                Some(Value::Object(sub))
            }
        }
        (Value::Object(want), None | Some(Value::Null)) if want.is_empty() => None,
        (Value::Array(want_items), Some(Value::Array(have_items))) => {
            if same_items(want_items, have_items) {
                None
            } else {
                Some(want.clone())
            }
        }
        (want, Some(have)) if equivalent(want, have) => None,
        (want, _) => Some(want.clone()),
    }
}

/// Scalar equality tolerant of integer/float and string/number encodings
fn equivalent(want: &Value, have: &Value) -> bool {
    if want == have {
        return true;
    }
    match (want, have) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.eq_ignore_ascii_case(&b.to_string())
        }
        _ => false,
    }
}

fn same_items(want: &[Value], have: &[Value]) -> bool {
    if want.len() != have.len() {
        return false;
    }
    let mut want: Vec<String> = want.iter().map(Value::to_string).collect();
    let mut have: Vec<String> = have.iter().map(Value::to_string).collect();
    want.sort();
    have.sort();
    want == have
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_only_named_fields_are_compared() {
        let desired = map(json!({"description": "ops", "enabled": true}));
        let observed = map(json!({"description": "old", "enabled": true, "links": {}, "extra": 1}));
        assert_eq!(patch(&desired, &observed), map(json!({"description": "ops"})));
    }

    #[test]
    fn test_nested_maps_contribute_differing_keys() {
        let desired = map(json!({"extra_specs": {"hw:cpu_policy": "dedicated", "a": "1"}}));
        let observed = map(json!({"extra_specs": {"hw:cpu_policy": "shared", "a": "1", "b": "2"}}));
        assert_eq!(
            patch(&desired, &observed),
            map(json!({"extra_specs": {"hw:cpu_policy": "dedicated"}}))
        );
    }

    #[test]
    fn test_lists_compare_unordered() {
        let desired = map(json!({"records": ["10.0.0.2", "10.0.0.1"]}));
        let observed = map(json!({"records": ["10.0.0.1", "10.0.0.2"]}));
        assert!(patch(&desired, &observed).is_empty());

        let observed = map(json!({"records": ["10.0.0.1"]}));
        assert_eq!(patch(&desired, &observed).len(), 1);
    }

    #[test]
    fn test_scalar_encodings() {
        assert_eq!(differs(&json!(1.0), Some(&json!(1))), None);
        assert_eq!(differs(&json!("True"), Some(&json!(true))), None);
        assert_eq!(differs(&json!("20"), Some(&json!(20))), None);
        assert_eq!(differs(&json!(20), Some(&json!(10))), Some(json!(20)));
    }

    #[test]
    fn test_absent_values() {
        assert_eq!(differs(&Value::Null, None), None);
        assert_eq!(differs(&json!({}), None), None);
        assert_eq!(differs(&json!("x"), None), Some(json!("x")));
    }
}
