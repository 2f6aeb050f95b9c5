//! Nova flavors
//!
//! Flavor fields carry extension prefixes on the wire; records use the plain
//! names (`ephemeral`, `is_public`). Only `description` and the extra specs
//! can change after creation.

use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::wire::{self, rename, str_field};
use reqwest::Method;
use seeder_cloud::{Filter, Record, ResourceKind, ServiceType};
use serde_json::{Map, Value, json};
use tracing::debug;

const NOVA: ServiceType = ServiceType::Compute;

/// Plain field name to wire name
const FLAVOR_RENAMES: &[(&str, &str)] = &[
    ("ephemeral", "OS-FLV-EXT-DATA:ephemeral"),
    ("is_public", "os-flavor-access:is_public"),
];

impl OpenStackClient {
    pub(crate) async fn list_flavors(&self, _filter: &Filter) -> Result<Vec<Record>> {
        // is_public=None lists public and private flavors for admins
        let req = Request::get(NOVA, "flavors/detail").query("is_public", "None");
        let items = self.list_pages(req, "flavors").await?;
        items.into_iter().map(flavor_record).collect()
    }

    pub(crate) async fn get_flavor(&self, id: &str) -> Result<Option<Record>> {
        let req = Request::get(NOVA, format!("flavors/{}", id));
        match self.send_optional(&req).await? {
            Some(body) => Ok(Some(flavor_record(wire::unwrap(Some("flavor"), body)?)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn create_flavor(&self, payload: &Value) -> Result<Record> {
        let mut body = wire::without(payload, &["extra_specs"]);
        for (plain, wire_name) in FLAVOR_RENAMES {
            rename(&mut body, plain, wire_name);
        }
        let req = Request::new(NOVA, Method::POST, "flavors").json(json!({ "flavor": body }));
        let created = wire::unwrap(Some("flavor"), self.send_json(&req).await?)?;
        let id = str_field(&created, "id")
            .ok_or_else(|| ClientError::Decode("flavor object without an id".into()))?;

        let mut record = flavor_record(created)?;
        if let Some(specs) = extra_specs(payload) {
            let applied = self.set_flavor_specs(&id, specs).await?;
            record.fields.insert("extra_specs".into(), applied);
        }
        Ok(record)
    }

    pub(crate) async fn update_flavor(&self, id: &str, patch: &Value) -> Result<Record> {
        let kind = ResourceKind::Flavor;
        if let Some(field) = patch
            .as_object()
            .into_iter()
            .flat_map(|m| m.keys())
            .find(|k| !matches!(k.as_str(), "description" | "extra_specs"))
        {
            return Err(ClientError::Unsupported {
                kind,
                operation: if field == "name" {
                    "rename"
                } else {
                    "change immutable field"
                },
            });
        }

        if let Some(description) = patch.get("description") {
            let req = Request::new(NOVA, Method::PUT, format!("flavors/{}", id))
                .json(json!({ "flavor": { "description": description } }));
            self.send_json(&req).await?;
        }
        if let Some(specs) = extra_specs(patch) {
            self.set_flavor_specs(id, specs).await?;
        }
        self.get_flavor(id)
            .await?
            .ok_or(ClientError::Status {
                method: "GET".into(),
                url: format!("flavors/{}", id),
                status: 404,
                message: "flavor disappeared after update".into(),
            })
    }

    /// Create or overwrite the named extra specs
    async fn set_flavor_specs(&self, id: &str, specs: &Map<String, Value>) -> Result<Value> {
        debug!(flavor = id, count = specs.len(), "Setting extra specs");
        let req = Request::new(NOVA, Method::POST, format!("flavors/{}/os-extra_specs", id))
            .json(json!({ "extra_specs": specs }));
        let body = self.send_json(&req).await?;
        wire::unwrap(Some("extra_specs"), body)
    }
}

fn extra_specs(payload: &Value) -> Option<&Map<String, Value>> {
    payload
        .get("extra_specs")
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
}

fn flavor_record(mut flavor: Value) -> Result<Record> {
    for (plain, wire_name) in FLAVOR_RENAMES {
        rename(&mut flavor, wire_name, plain);
    }
    if let Some(map) = flavor.as_object_mut() {
        map.remove("links");
        map.remove("OS-FLV-DISABLED:disabled");
        // nova reports "no swap" as an empty string
        if map.get("swap").is_some_and(|s| s == "") {
            map.insert("swap".into(), json!(0));
        }
        map.entry("extra_specs").or_insert_with(|| json!({}));
    }
    wire::record(ResourceKind::Flavor, flavor)
}
