//! Placement resource classes and traits
//!
//! Both are identified by name. `PUT /<collection>/<name>` creates them
//! idempotently, so creation never conflicts.

use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::wire::{self, require};
use reqwest::Method;
use seeder_cloud::{Record, ResourceKind, ServiceType};
use serde_json::{Value, json};

const PLACEMENT: ServiceType = ServiceType::Placement;

fn collection(kind: ResourceKind) -> Result<&'static str> {
    match kind {
        ResourceKind::ResourceClass => Ok("resource_classes"),
        ResourceKind::Trait => Ok("traits"),
        _ => Err(ClientError::Unsupported {
            kind,
            operation: "placement",
        }),
    }
}

impl OpenStackClient {
    /// Custom resource classes and traits; standard ones are never managed
    pub(crate) async fn list_placement(&self, kind: ResourceKind) -> Result<Vec<Record>> {
        let path = collection(kind)?;
        let mut req = Request::get(PLACEMENT, path);
        if kind == ResourceKind::Trait {
            req = req.query("name", "startswith:CUSTOM_");
        }
        let body = self.send_json(&req).await?;
        let entries = body
            .get(path)
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Decode(format!("response lacks '{}'", path)))?;

        entries
            .iter()
            .filter_map(|entry| match entry {
                // traits are bare strings, resource classes objects
                Value::String(name) => Some(name.clone()),
                other => other.get("name").and_then(Value::as_str).map(str::to_string),
            })
            .filter(|name| name.starts_with("CUSTOM_"))
            .map(|name| named(kind, &name))
            .collect()
    }

    pub(crate) async fn create_placement(&self, kind: ResourceKind, payload: &Value) -> Result<Record> {
        let path = collection(kind)?;
        let name = require(kind, payload, "name")?;
        self.send(&Request::new(PLACEMENT, Method::PUT, format!("{}/{}", path, name)))
            .await?;
        named(kind, &name)
    }
}

fn named(kind: ResourceKind, name: &str) -> Result<Record> {
    wire::record(kind, json!({ "id": name, "name": name }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections() {
        assert_eq!(collection(ResourceKind::Trait).unwrap(), "traits");
        assert_eq!(collection(ResourceKind::ResourceClass).unwrap(), "resource_classes");
        assert!(collection(ResourceKind::Flavor).is_err());
    }

    #[test]
    fn test_named_record() {
        let record = named(ResourceKind::Trait, "CUSTOM_RAID5").unwrap();
        assert_eq!(record.id, "CUSTOM_RAID5");
        assert_eq!(record.str("name"), Some("CUSTOM_RAID5"));
    }
}
