//! Body helpers: envelopes, field renames, error messages

use crate::error::{ClientError, Result};
use seeder_cloud::{Record, ResourceKind};
use serde_json::{Map, Value, json};

/// First structured error message found in a response body
///
/// Recognises the shapes used across services:
/// - `{"error": {"message": ..}}` (keystone)
/// - `{"NeutronError": {"message": ..}}`, `{"badRequest": {"message": ..}}` (neutron, nova, cinder, manila)
/// - `{"message": ..}` (designate)
/// - `{"errors": [{"detail": ..}]}` (placement)
pub fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        // swift and proxies answer in plain text or HTML
        return trimmed
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('<'))
            .map(|l| l.chars().take(200).collect());
    };

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(first) = value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        return first
            .get("detail")
            .or_else(|| first.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    value.as_object()?.values().find_map(|inner| {
        inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

/// Turn a JSON object into a record keyed by its `id`
pub fn record(kind: ResourceKind, value: Value) -> Result<Record> {
    Record::from_value(value, "id")
        .ok_or_else(|| ClientError::Decode(format!("{} object without an id", kind)))
}

/// Wrap `body` in `{key: body}` when the service uses envelopes
pub fn wrap(key: Option<&str>, body: Value) -> Value {
    match key {
        Some(key) => {
            let mut map = Map::new();
            map.insert(key.to_string(), body);
            Value::Object(map)
        }
        None => body,
    }
}

/// Remove the `{key: ..}` envelope of a response
pub fn unwrap(key: Option<&str>, mut body: Value) -> Result<Value> {
    match key {
        Some(key) => body
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| ClientError::Decode(format!("response lacks '{}'", key))),
        None => Ok(body),
    }
}

/// String value of `field` in `payload`
pub fn str_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn require(kind: ResourceKind, payload: &Value, field: &'static str) -> Result<String> {
    str_field(payload, field).ok_or(ClientError::missing(kind, field))
}

/// Copy of `payload` without `fields`
pub fn without(payload: &Value, fields: &[&str]) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !fields.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Rename `from` to `to` in an object, if present
pub fn rename(value: &mut Value, from: &str, to: &str) {
    if let Some(map) = value.as_object_mut()
        && let Some(v) = map.remove(from)
    {
        map.insert(to.to_string(), v);
    }
}

/// Synthetic record for relations the services expose without an id
pub fn relation(kind: ResourceKind, parts: &[&str], fields: Value) -> Result<Record> {
    let mut value = fields;
    match value.as_object_mut() {
        Some(map) => {
            map.insert("id".to_string(), json!(parts.join(":")));
        }
        None => return Err(ClientError::Decode(format!("{} relation is not an object", kind))),
    }
    record(kind, value)
}
