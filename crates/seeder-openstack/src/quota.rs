//! Project quotas
//!
//! Every service keeps one quota set per project, read with `GET` and
//! overwritten field by field with `PUT` (designate: `PATCH`). Records use
//! the project id as their id.

use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::wire::{self, require};
use reqwest::Method;
use seeder_cloud::{Filter, Record, ResourceKind, ServiceType};
use serde_json::Value;

struct QuotaRoute {
    service: ServiceType,
    path: &'static str,
    envelope: Option<&'static str>,
    update: Method,
}

fn quota_route(kind: ResourceKind) -> Result<QuotaRoute> {
    use ResourceKind as K;
    let (service, path, envelope, update) = match kind {
        K::NetworkQuota => (ServiceType::Network, "quotas", Some("quota"), Method::PUT),
        K::ComputeQuota => (ServiceType::Compute, "os-quota-sets", Some("quota_set"), Method::PUT),
        K::VolumeQuota => (
            ServiceType::BlockStorage,
            "os-quota-sets",
            Some("quota_set"),
            Method::PUT,
        ),
        K::ShareQuota => (
            ServiceType::SharedFilesystem,
            "quota-sets",
            Some("quota_set"),
            Method::PUT,
        ),
        K::DnsQuota => (ServiceType::Dns, "quotas", None, Method::PATCH),
        _ => {
            return Err(ClientError::Unsupported {
                kind,
                operation: "quota",
            });
        }
    };
    Ok(QuotaRoute {
        service,
        path,
        envelope,
        update,
    })
}

impl QuotaRoute {
    fn request(&self, method: Method, project: &str) -> Request {
        let req = Request::new(self.service, method, format!("{}/{}", self.path, project));
        if self.service == ServiceType::Dns {
            // designate only shows foreign quotas to all-projects requests
            req.header("X-Auth-All-Projects", "true")
        } else {
            req
        }
    }
}

impl OpenStackClient {
    pub(crate) async fn list_quota(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>> {
        let project = filter
            .get("project_id")
            .ok_or(ClientError::missing(kind, "project_id"))?;
        Ok(self.get_quota(kind, project).await?.into_iter().collect())
    }

    pub(crate) async fn get_quota(&self, kind: ResourceKind, project: &str) -> Result<Option<Record>> {
        let route = quota_route(kind)?;
        let req = route.request(Method::GET, project);
        match self.send_optional(&req).await? {
            Some(body) => Ok(Some(quota_record(
                kind,
                project,
                wire::unwrap(route.envelope, body)?,
            )?)),
            None => Ok(None),
        }
    }

    /// Quota sets always exist; creating one is an update of the defaults
    pub(crate) async fn put_quota(&self, kind: ResourceKind, payload: &Value) -> Result<Record> {
        let route = quota_route(kind)?;
        let project = require(kind, payload, "project_id")?;
        let body = wire::wrap(route.envelope, wire::without(payload, &["project_id", "id"]));
        let req = route.request(route.update.clone(), &project).json(body);
        let response = self.send_json(&req).await?;
        let values = if response.is_null() {
            wire::without(payload, &["project_id", "id"])
        } else {
            wire::unwrap(route.envelope, response)?
        };
        quota_record(kind, &project, values)
    }
}

/// Quota values with the project id as record id
fn quota_record(kind: ResourceKind, project: &str, values: Value) -> Result<Record> {
    let mut values = wire::without(&values, &["id", "tenant_id"]);
    match values.as_object_mut() {
        Some(map) => {
            map.insert("id".into(), Value::String(project.to_string()));
            map.insert("project_id".into(), Value::String(project.to_string()));
        }
        None => return Err(ClientError::Decode(format!("{} set is not an object", kind))),
    }
    wire::record(kind, values)
}
