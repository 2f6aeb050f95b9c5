//! Keystone relations without a plain collection route
//!
//! Domain configuration, group membership, implied roles and role
//! assignments are addressed through nested URLs and have no id of their
//! own; records carry a synthetic id built from the related ids.

use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::wire::{self, relation, require, str_field};
use reqwest::Method;
use seeder_cloud::{Filter, Record, ResourceKind, ServiceType};
use serde_json::{Value, json};

const KEYSTONE: ServiceType = ServiceType::Identity;

impl OpenStackClient {
    // ============ domain configuration ============

    pub(crate) async fn list_domain_config(&self, filter: &Filter) -> Result<Vec<Record>> {
        let domain = filter
            .get("domain_id")
            .ok_or(ClientError::missing(ResourceKind::DomainConfig, "domain_id"))?;
        let req = Request::get(KEYSTONE, format!("domains/{}/config", domain));
        match self.send_optional(&req).await? {
            Some(body) => Ok(vec![domain_config_record(domain, body)?]),
            None => Ok(Vec::new()),
        }
    }

    /// Create (`PUT`) or merge (`PATCH`) the configuration of a domain
    pub(crate) async fn put_domain_config(&self, payload: &Value, create: bool) -> Result<Record> {
        let domain = require(ResourceKind::DomainConfig, payload, "domain_id")?;
        let config = payload
            .get("config")
            .cloned()
            .ok_or(ClientError::missing(ResourceKind::DomainConfig, "config"))?;
        let method = if create { Method::PUT } else { Method::PATCH };
        let req = Request::new(KEYSTONE, method, format!("domains/{}/config", domain))
            .json(json!({ "config": config }));
        let body = self.send_json(&req).await?;
        domain_config_record(&domain, body)
    }

    // ============ group membership ============

    pub(crate) async fn list_memberships(&self, filter: &Filter) -> Result<Vec<Record>> {
        let group = filter
            .get("group_id")
            .ok_or(ClientError::missing(ResourceKind::GroupMembership, "group_id"))?;
        let users = self
            .list_pages(Request::get(KEYSTONE, format!("groups/{}/users", group)), "users")
            .await?;
        users
            .iter()
            .filter_map(|u| str_field(u, "id"))
            .map(|user| membership(group, &user))
            .collect()
    }

    pub(crate) async fn add_membership(&self, payload: &Value) -> Result<Record> {
        let (group, user) = membership_ids(payload)?;
        let req = Request::new(KEYSTONE, Method::PUT, format!("groups/{}/users/{}", group, user));
        self.send(&req).await?;
        membership(&group, &user)
    }

    pub(crate) async fn remove_membership(&self, payload: &Value) -> Result<()> {
        let (group, user) = membership_ids(payload)?;
        let req = Request::new(
            KEYSTONE,
            Method::DELETE,
            format!("groups/{}/users/{}", group, user),
        );
        match self.send(&req).await {
            Ok(_) | Err(ClientError::Status { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // ============ implied roles ============

    pub(crate) async fn list_role_inferences(&self) -> Result<Vec<Record>> {
        let body = self
            .send_json(&Request::get(KEYSTONE, "role_inferences"))
            .await?;
        flatten_inferences(&body)
    }

    pub(crate) async fn create_role_inference(&self, payload: &Value) -> Result<Record> {
        let kind = ResourceKind::RoleInference;
        let prior = require(kind, payload, "prior_role_id")?;
        let implied = require(kind, payload, "implied_role_id")?;
        let req = Request::new(
            KEYSTONE,
            Method::PUT,
            format!("roles/{}/implies/{}", prior, implied),
        );
        self.send(&req).await?;
        inference(&prior, &implied)
    }

    // ============ role assignments ============

    pub(crate) async fn list_role_assignments(&self, filter: &Filter) -> Result<Vec<Record>> {
        let mut req = Request::get(KEYSTONE, "role_assignments");
        for (field, param) in [
            ("user_id", "user.id"),
            ("group_id", "group.id"),
            ("role_id", "role.id"),
            ("project_id", "scope.project.id"),
            ("domain_id", "scope.domain.id"),
            ("system", "scope.system"),
        ] {
            if let Some(value) = filter.get(field) {
                req = req.query(param, value);
            }
        }
        if filter.get("inherited") == Some("true") {
            req = req.query("scope.OS-INHERIT:inherited_to", "projects");
        }

        let items = self.list_pages(req, "role_assignments").await?;
        items.iter().map(flatten_assignment).collect()
    }

    /// Grant a role; keystone answers `204` and grants are idempotent
    pub(crate) async fn grant_role(&self, payload: &Value) -> Result<Record> {
        let path = assignment_path(payload)?;
        self.send(&Request::new(KEYSTONE, Method::PUT, path)).await?;
        assignment_record(payload)
    }
}

fn domain_config_record(domain: &str, body: Value) -> Result<Record> {
    let config = wire::unwrap(Some("config"), body)?;
    relation(
        ResourceKind::DomainConfig,
        &[domain],
        json!({ "domain_id": domain, "config": config }),
    )
}

fn membership_ids(payload: &Value) -> Result<(String, String)> {
    let kind = ResourceKind::GroupMembership;
    Ok((
        require(kind, payload, "group_id")?,
        require(kind, payload, "user_id")?,
    ))
}

fn membership(group: &str, user: &str) -> Result<Record> {
    relation(
        ResourceKind::GroupMembership,
        &[group, user],
        json!({ "group_id": group, "user_id": user }),
    )
}

fn inference(prior: &str, implied: &str) -> Result<Record> {
    relation(
        ResourceKind::RoleInference,
        &[prior, implied],
        json!({ "prior_role_id": prior, "implied_role_id": implied }),
    )
}

/// `{"role_inferences": [{"prior_role": {..}, "implies": [{..}]}]}` to one
/// record per pair
fn flatten_inferences(body: &Value) -> Result<Vec<Record>> {
    let rules = body
        .get("role_inferences")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::Decode("response lacks 'role_inferences'".into()))?;

    let mut records = Vec::new();
    for rule in rules {
        let Some(prior) = rule.get("prior_role").and_then(|r| str_field(r, "id")) else {
            continue;
        };
        for implied in rule
            .get("implies")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(implied) = str_field(implied, "id") {
                records.push(inference(&prior, &implied)?);
            }
        }
    }
    Ok(records)
}

/// Nested keystone assignment to the flat tuple compared by the engine
fn flatten_assignment(item: &Value) -> Result<Record> {
    let id_of = |path: &[&str]| -> Option<String> {
        let mut cursor = item;
        for segment in path {
            cursor = cursor.get(*segment)?;
        }
        cursor.as_str().map(str::to_string)
    };
    let scope = item.get("scope");
    let system = scope
        .and_then(|s| s.get("system"))
        .and_then(|s| s.get("all"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let inherited = scope
        .and_then(|s| s.get("OS-INHERIT:inherited_to"))
        .is_some();

    let fields = json!({
        "user_id": id_of(&["user", "id"]),
        "group_id": id_of(&["group", "id"]),
        "role_id": id_of(&["role", "id"]),
        "project_id": id_of(&["scope", "project", "id"]),
        "domain_id": id_of(&["scope", "domain", "id"]),
        "system": if system { Some("all") } else { None },
        "inherited": inherited,
    });
    assignment_record(&fields)
}

fn assignment_record(payload: &Value) -> Result<Record> {
    let part = |field: &str| str_field(payload, field).unwrap_or_else(|| "-".into());
    let inherited = payload
        .get("inherited")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let parts = [
        part("user_id"),
        part("group_id"),
        part("role_id"),
        part("project_id"),
        part("domain_id"),
        part("system"),
        inherited.to_string(),
    ];
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();

    let mut fields = payload.clone();
    if let Some(map) = fields.as_object_mut() {
        map.insert("inherited".into(), Value::Bool(inherited));
    }
    relation(ResourceKind::RoleAssignment, &refs, fields)
}

/// Grant URL for an assignment payload
///
/// `{projects|domains}/{scope}/{users|groups}/{actor}/roles/{role}`,
/// `system/{users|groups}/{actor}/roles/{role}`, or the `OS-INHERIT`
/// variant for inherited grants.
fn assignment_path(payload: &Value) -> Result<String> {
    let kind = ResourceKind::RoleAssignment;
    let role = require(kind, payload, "role_id")?;
    let actor = match (str_field(payload, "user_id"), str_field(payload, "group_id")) {
        (Some(user), None) => format!("users/{}", user),
        (None, Some(group)) => format!("groups/{}", group),
        _ => return Err(ClientError::missing(kind, "user_id")),
    };
    let inherited = payload
        .get("inherited")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let scope = if let Some(project) = str_field(payload, "project_id") {
        format!("projects/{}", project)
    } else if let Some(domain) = str_field(payload, "domain_id") {
        format!("domains/{}", domain)
    } else if str_field(payload, "system").is_some() {
        if inherited {
            return Err(ClientError::Unsupported {
                kind,
                operation: "inherited system grant",
            });
        }
        return Ok(format!("system/{}/roles/{}", actor, role));
    } else {
        return Err(ClientError::missing(kind, "project_id"));
    };

    if inherited {
        Ok(format!(
            "OS-INHERIT/{}/{}/roles/{}/inherited_to_projects",
            scope, actor, role
        ))
    } else {
        Ok(format!("{}/{}/roles/{}", scope, actor, role))
    }
}
