//! Project access to private flavors, volume types and share types
//!
//! The three services expose the same relation with different paths, list
//! keys and action names. Records are `{resource_id, project_id}` pairs.

use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::wire::{relation, require, str_field};
use reqwest::Method;
use seeder_cloud::{Filter, Record, ResourceKind, ServiceType};
use serde_json::{Map, Value, json};

struct AccessRoute {
    service: ServiceType,
    /// Object collection (`flavors`, `types`)
    collection: &'static str,
    /// Sub-resource listing the grants
    list_path: &'static str,
    list_key: &'static str,
    /// Project field inside listed entries
    project_field: &'static str,
    add_action: &'static str,
    remove_action: &'static str,
    /// Project field inside the action body
    action_field: &'static str,
}

fn access_route(kind: ResourceKind) -> Result<AccessRoute> {
    let route = match kind {
        ResourceKind::FlavorAccess => AccessRoute {
            service: ServiceType::Compute,
            collection: "flavors",
            list_path: "os-flavor-access",
            list_key: "flavor_access",
            project_field: "tenant_id",
            add_action: "addTenantAccess",
            remove_action: "removeTenantAccess",
            action_field: "tenant",
        },
        ResourceKind::VolumeTypeAccess => AccessRoute {
            service: ServiceType::BlockStorage,
            collection: "types",
            list_path: "os-volume-type-access",
            list_key: "volume_type_access",
            project_field: "project_id",
            add_action: "addProjectAccess",
            remove_action: "removeProjectAccess",
            action_field: "project",
        },
        ResourceKind::ShareTypeAccess => AccessRoute {
            service: ServiceType::SharedFilesystem,
            collection: "types",
            list_path: "share_type_access",
            list_key: "share_type_access",
            project_field: "project_id",
            add_action: "addProjectAccess",
            remove_action: "removeProjectAccess",
            action_field: "project",
        },
        _ => {
            return Err(ClientError::Unsupported {
                kind,
                operation: "access",
            });
        }
    };
    Ok(route)
}

impl AccessRoute {
    fn action(&self, resource: &str, action: &str, project: &str) -> Request {
        let mut inner = Map::new();
        inner.insert(self.action_field.into(), json!(project));
        let mut body = Map::new();
        body.insert(action.into(), Value::Object(inner));
        Request::new(
            self.service,
            Method::POST,
            format!("{}/{}/action", self.collection, resource),
        )
        .json(Value::Object(body))
    }
}

impl OpenStackClient {
    pub(crate) async fn list_access(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>> {
        let route = access_route(kind)?;
        let resource = filter
            .get("resource_id")
            .ok_or(ClientError::missing(kind, "resource_id"))?;
        let req = Request::get(
            route.service,
            format!("{}/{}/{}", route.collection, resource, route.list_path),
        );
        // public objects answer 404 or 409: they have no access list
        let body = match self.send_json(&req).await {
            Ok(body) => body,
            Err(ClientError::Status {
                status: 404 | 409, ..
            }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let entries = body
            .get(route.list_key)
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Decode(format!("response lacks '{}'", route.list_key)))?;
        entries
            .iter()
            .filter_map(|e| str_field(e, route.project_field))
            .map(|project| grant(kind, resource, &project))
            .collect()
    }

    pub(crate) async fn grant_access(&self, kind: ResourceKind, payload: &Value) -> Result<Record> {
        let route = access_route(kind)?;
        let resource = require(kind, payload, "resource_id")?;
        let project = require(kind, payload, "project_id")?;
        self.send(&route.action(&resource, route.add_action, &project))
            .await?;
        grant(kind, &resource, &project)
    }

    pub(crate) async fn revoke_access(&self, kind: ResourceKind, payload: &Value) -> Result<()> {
        let route = access_route(kind)?;
        let resource = require(kind, payload, "resource_id")?;
        let project = require(kind, payload, "project_id")?;
        match self
            .send(&route.action(&resource, route.remove_action, &project))
            .await
        {
            Ok(_) | Err(ClientError::Status { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn grant(kind: ResourceKind, resource: &str, project: &str) -> Result<Record> {
    relation(
        kind,
        &[resource, project],
        json!({ "resource_id": resource, "project_id": project }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_action_body() {
        let route = access_route(ResourceKind::FlavorAccess).unwrap();
        let req = route.action("f1", route.add_action, "p1");
        assert_eq!(req.path, "flavors/f1/action");
        assert_eq!(req.body, Some(json!({"addTenantAccess": {"tenant": "p1"}})));
    }

    #[test]
    fn test_share_type_action_body() {
        let route = access_route(ResourceKind::ShareTypeAccess).unwrap();
        let req = route.action("st1", route.remove_action, "p2");
        assert_eq!(req.service, ServiceType::SharedFilesystem);
        assert_eq!(req.path, "types/st1/action");
        assert_eq!(req.body, Some(json!({"removeProjectAccess": {"project": "p2"}})));
    }

    #[test]
    fn test_grant_record() {
        let record = grant(ResourceKind::VolumeTypeAccess, "vt1", "p1").unwrap();
        assert_eq!(record.id, "vt1:p1");
        assert!(record.matches(&Filter::new().with("resource_id", "vt1").with("project_id", "p1")));
    }

    #[test]
    fn test_non_access_kind() {
        assert!(access_route(ResourceKind::Flavor).is_err());
    }
}
