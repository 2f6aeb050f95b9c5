//! Cinder volume types, manila share types and swift
//!
//! Volume and share types share one shape: `types` collection, a prefixed
//! visibility flag and an `extra_specs` sub-resource. Swift addresses
//! accounts and containers by URL and keeps their state in headers.

use crate::catalog::swift_account_url;
use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::pagination::swift_marker;
use crate::wire::{self, rename, require, str_field};
use reqwest::Method;
use reqwest::header::HeaderMap;
use seeder_cloud::{Filter, Record, ResourceKind, ServiceType};
use serde_json::{Map, Value, json};
use tracing::debug;

const META_PREFIX: &str = "x-container-meta-";

struct TypeRoute {
    service: ServiceType,
    singular: &'static str,
    plural: &'static str,
    /// `is_public` query value listing every type
    list_all: &'static str,
    visibility: &'static str,
}

fn type_route(kind: ResourceKind) -> Result<TypeRoute> {
    match kind {
        ResourceKind::VolumeType => Ok(TypeRoute {
            service: ServiceType::BlockStorage,
            singular: "volume_type",
            plural: "volume_types",
            list_all: "None",
            visibility: "os-volume-type-access:is_public",
        }),
        ResourceKind::ShareType => Ok(TypeRoute {
            service: ServiceType::SharedFilesystem,
            singular: "share_type",
            plural: "share_types",
            list_all: "all",
            visibility: "share_type_access:is_public",
        }),
        _ => Err(ClientError::Unsupported {
            kind,
            operation: "type",
        }),
    }
}

impl TypeRoute {
    fn record(&self, kind: ResourceKind, mut value: Value) -> Result<Record> {
        rename(&mut value, self.visibility, "is_public");
        if let Some(map) = value.as_object_mut() {
            // manila repeats the required specs in a second map
            map.remove("required_extra_specs");
            map.entry("extra_specs").or_insert_with(|| json!({}));
        }
        wire::record(kind, value)
    }
}

impl OpenStackClient {
    // ============ volume and share types ============

    pub(crate) async fn list_types(&self, kind: ResourceKind, _filter: &Filter) -> Result<Vec<Record>> {
        let route = type_route(kind)?;
        let req = Request::get(route.service, "types").query("is_public", route.list_all);
        let items = self.list_pages(req, route.plural).await?;
        items.into_iter().map(|t| route.record(kind, t)).collect()
    }

    pub(crate) async fn get_type(&self, kind: ResourceKind, id: &str) -> Result<Option<Record>> {
        let route = type_route(kind)?;
        let req = Request::get(route.service, format!("types/{}", id));
        match self.send_optional(&req).await? {
            Some(body) => Ok(Some(
                route.record(kind, wire::unwrap(Some(route.singular), body)?)?,
            )),
            None => Ok(None),
        }
    }

    pub(crate) async fn create_type(&self, kind: ResourceKind, payload: &Value) -> Result<Record> {
        let route = type_route(kind)?;
        let mut body = payload.clone();
        rename(&mut body, "is_public", route.visibility);
        let req = Request::new(route.service, Method::POST, "types")
            .json(wire::wrap(Some(route.singular), body));
        let created = wire::unwrap(Some(route.singular), self.send_json(&req).await?)?;
        route.record(kind, created)
    }

    pub(crate) async fn update_type(
        &self,
        kind: ResourceKind,
        id: &str,
        patch: &Value,
    ) -> Result<Record> {
        let route = type_route(kind)?;
        let mut fields = wire::without(patch, &["extra_specs"]);
        if fields.as_object().is_some_and(|m| !m.is_empty()) {
            rename(&mut fields, "is_public", route.visibility);
            let req = Request::new(route.service, Method::PUT, format!("types/{}", id))
                .json(wire::wrap(Some(route.singular), fields));
            self.send_json(&req).await?;
        }
        if let Some(specs) = patch
            .get("extra_specs")
            .and_then(Value::as_object)
            .filter(|m| !m.is_empty())
        {
            debug!(kind = %kind, id, count = specs.len(), "Setting extra specs");
            let req = Request::new(route.service, Method::POST, format!("types/{}/extra_specs", id))
                .json(json!({ "extra_specs": specs }));
            self.send_json(&req).await?;
        }
        self.get_type(kind, id).await?.ok_or(ClientError::Status {
            method: "GET".into(),
            url: format!("types/{}", id),
            status: 404,
            message: format!("{} disappeared after update", kind),
        })
    }

    // ============ swift ============

    async fn swift_account(&self, project: &str) -> Result<String> {
        let token = self.token().await?;
        let root = self.root(&token, ServiceType::ObjectStore)?;
        Ok(swift_account_url(&root, project))
    }

    pub(crate) async fn list_swift_account(&self, filter: &Filter) -> Result<Vec<Record>> {
        let kind = ResourceKind::SwiftAccount;
        let project = filter
            .get("project_id")
            .ok_or(ClientError::missing(kind, "project_id"))?;
        let url = self.swift_account(project).await?;
        match self.send_head(&Request::new(ServiceType::ObjectStore, Method::HEAD, url)).await? {
            Some(_) => Ok(vec![account_record(project)?]),
            None => Ok(Vec::new()),
        }
    }

    /// Accounts are created by a reseller-admin `PUT`
    pub(crate) async fn create_swift_account(&self, payload: &Value) -> Result<Record> {
        let project = require(ResourceKind::SwiftAccount, payload, "project_id")?;
        let url = self.swift_account(&project).await?;
        self.send(&Request::new(ServiceType::ObjectStore, Method::PUT, url))
            .await?;
        account_record(&project)
    }

    pub(crate) async fn list_swift_containers(&self, filter: &Filter) -> Result<Vec<Record>> {
        let kind = ResourceKind::SwiftContainer;
        let project = filter
            .get("project_id")
            .ok_or(ClientError::missing(kind, "project_id"))?;
        let account = self.swift_account(project).await?;

        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut req = Request::get(ServiceType::ObjectStore, account.clone()).query("format", "json");
            if let Some(m) = &marker {
                req = req.query("marker", m.clone());
            }
            let page = match self.send_json(&req).await {
                Ok(Value::Array(page)) => page,
                Ok(Value::Null) => Vec::new(),
                Ok(_) => return Err(ClientError::Decode("container listing is not a list".into())),
                // account not created yet
                Err(ClientError::Status { status: 404, .. }) => return Ok(Vec::new()),
                Err(e) => return Err(e),
            };
            let next = swift_marker(&page);
            names.extend(page.iter().filter_map(|c| str_field(c, "name")));
            match next {
                Some(m) if marker.as_ref() != Some(&m) => marker = Some(m),
                _ => break,
            }
        }

        let wanted = filter.get("name");
        let mut records = Vec::new();
        for name in names.iter().filter(|n| wanted.is_none_or(|w| w == n.as_str())) {
            let req = Request::new(
                ServiceType::ObjectStore,
                Method::HEAD,
                format!("{}/{}", account, name),
            );
            if let Some(headers) = self.send_head(&req).await? {
                records.push(container_record(project, name, &headers)?);
            }
        }
        Ok(records)
    }

    /// `PUT` creates a container, `POST` updates its metadata and ACLs
    pub(crate) async fn write_swift_container(&self, payload: &Value, create: bool) -> Result<Record> {
        let kind = ResourceKind::SwiftContainer;
        let project = require(kind, payload, "project_id")?;
        let name = require(kind, payload, "name")?;
        let account = self.swift_account(&project).await?;

        let method = if create { Method::PUT } else { Method::POST };
        let mut req = Request::new(ServiceType::ObjectStore, method, format!("{}/{}", account, name));
        for (header, value) in container_headers(payload) {
            req = req.header(header, value);
        }
        self.send(&req).await?;

        let mut fields = payload.clone();
        if let Some(map) = fields.as_object_mut() {
            map.insert("id".into(), json!(format!("{}/{}", project, name)));
        }
        wire::record(kind, fields)
    }
}

fn account_record(project: &str) -> Result<Record> {
    wire::record(
        ResourceKind::SwiftAccount,
        json!({ "id": project, "project_id": project }),
    )
}

/// Headers carrying the named container state of a payload
fn container_headers(payload: &Value) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if let Some(metadata) = payload.get("metadata").and_then(Value::as_object) {
        for (key, value) in metadata {
            let value = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            headers.push((format!("X-Container-Meta-{}", key), value));
        }
    }
    for (field, header) in [("read_acl", "X-Container-Read"), ("write_acl", "X-Container-Write")] {
        if let Some(acl) = payload.get(field).and_then(Value::as_str) {
            headers.push((header.to_string(), acl.to_string()));
        }
    }
    headers
}

fn container_record(project: &str, name: &str, headers: &HeaderMap) -> Result<Record> {
    let text = |h: &str| headers.get(h).and_then(|v| v.to_str().ok()).map(str::to_string);

    let mut metadata = Map::new();
    for (header, value) in headers {
        if let Some(key) = header.as_str().strip_prefix(META_PREFIX)
            && let Ok(value) = value.to_str()
        {
            metadata.insert(key.to_string(), json!(value));
        }
    }
    wire::record(
        ResourceKind::SwiftContainer,
        json!({
            "id": format!("{}/{}", project, name),
            "project_id": project,
            "name": name,
            "metadata": metadata,
            "read_acl": text("x-container-read"),
            "write_acl": text("x-container-write"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_type_record_visibility() {
        let route = type_route(ResourceKind::VolumeType).unwrap();
        let record = route
            .record(
                ResourceKind::VolumeType,
                json!({"id": "vt1", "name": "ssd", "os-volume-type-access:is_public": false}),
            )
            .unwrap();
        assert_eq!(record.get("is_public"), Some(&json!(false)));
        assert_eq!(record.get("extra_specs"), Some(&json!({})));
    }

    #[test]
    fn test_share_type_drops_required_specs() {
        let route = type_route(ResourceKind::ShareType).unwrap();
        let record = route
            .record(
                ResourceKind::ShareType,
                json!({
                    "id": "st1",
                    "name": "cephfs",
                    "share_type_access:is_public": true,
                    "required_extra_specs": {"driver_handles_share_servers": "False"},
                    "extra_specs": {"driver_handles_share_servers": "False"}
                }),
            )
            .unwrap();
        assert!(record.get("required_extra_specs").is_none());
        assert_eq!(record.get("is_public"), Some(&json!(true)));
    }

    #[test]
    fn test_container_headers() {
        let headers = container_headers(&json!({
            "name": "backups",
            "metadata": {"owner": "ops"},
            "read_acl": ".r:*"
        }));
        assert_eq!(
            headers,
            vec![
                ("X-Container-Meta-owner".to_string(), "ops".to_string()),
                ("X-Container-Read".to_string(), ".r:*".to_string()),
            ]
        );
    }

    #[test]
    fn test_container_record_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-container-meta-owner", HeaderValue::from_static("ops"));
        headers.insert("x-container-read", HeaderValue::from_static(".r:*"));
        headers.insert("x-container-object-count", HeaderValue::from_static("3"));

        let record = container_record("p1", "backups", &headers).unwrap();
        assert_eq!(record.id, "p1/backups");
        assert_eq!(record.get("metadata"), Some(&json!({"owner": "ops"})));
        assert_eq!(record.str("read_acl"), Some(".r:*"));
        assert_eq!(record.get("write_acl"), Some(&Value::Null));
    }
}
