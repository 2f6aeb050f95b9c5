//! Object reconcilers
//!
//! Every class reduces to one of two shapes. Plain objects go through
//! [`converge`]: list by unique key, create from the named fields when
//! absent, otherwise patch the named fields that differ. Set relations
//! (group members, access grants) go through [`access::converge_grants`].
//! Remote failures end up in the returned [`Failure`], never past
//! [`dispatch`].

mod access;
mod catalog;
mod compute;
mod dns;
mod identity;
mod network;
mod quota;
mod storage;

use crate::diff;
use crate::plan::{Op, Task};
use crate::resolver::{Resolver, is_global, is_placeholder, placeholder};
use seeder_cloud::{CloudApi, CloudError, Filter, Outcome, Record, ReportEntry, ResourceKind};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles shared by every reconciler of one run
#[derive(Clone)]
pub struct Context {
    pub cloud: Arc<dyn CloudApi>,
    pub resolver: Arc<Resolver>,
    pub dry_run: bool,
}

impl Context {
    pub fn new(cloud: Arc<dyn CloudApi>, resolver: Arc<Resolver>, dry_run: bool) -> Self {
        Self {
            cloud,
            resolver,
            dry_run,
        }
    }

    pub(crate) async fn resolve(&self, kind: ResourceKind, key: &str) -> Result<String, CloudError> {
        self.resolver.resolve(kind, key).await
    }
}

/// Successful reconciliation of one object
#[derive(Debug, Clone)]
pub struct Step {
    pub outcome: Outcome,
    pub id: Option<String>,
    pub detail: Option<String>,
    /// Object as last seen or written; `None` for dry-run creations
    pub record: Option<Record>,
}

impl Step {
    fn new(outcome: Outcome, id: impl Into<String>) -> Self {
        Self {
            outcome,
            id: Some(id.into()),
            detail: None,
            record: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn with_record(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Failure {
    pub error: CloudError,
    /// Partial progress reached before the failure
    pub detail: Option<String>,
}

impl From<CloudError> for Failure {
    fn from(error: CloudError) -> Self {
        Self {
            error,
            detail: None,
        }
    }
}

pub type StepResult = std::result::Result<Step, Failure>;

/// Named fields of an object, absent optionals left out
#[derive(Debug, Default, Clone)]
pub(crate) struct Fields(Map<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn opt<T: Into<Value>>(self, field: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(field, value),
            None => self,
        }
    }

    /// Maps and lists are named only when non-empty
    pub fn non_empty(self, field: &str, value: Value) -> Self {
        let empty = match &value {
            Value::Object(m) => m.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if empty { self } else { self.set(field, value) }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Desired state of one plain object
#[derive(Debug, Clone)]
pub(crate) struct Desired {
    pub kind: ResourceKind,
    pub key: String,
    /// Unique key, parents resolved
    pub filter: Filter,
    /// Compared and patched
    pub fields: Map<String, Value>,
    /// Sent on create only, never compared
    pub create_only: Map<String, Value>,
    /// Addressing fields the client needs on every write
    pub routing: Map<String, Value>,
    /// Named fields the server refuses to change
    pub immutable: &'static [&'static str],
    /// Ignore matches carrying a `domain_id` (global roles)
    pub global_only: bool,
}

impl Desired {
    pub fn new(kind: ResourceKind, key: impl Into<String>, filter: Filter) -> Self {
        Self {
            kind,
            key: key.into(),
            filter,
            fields: Map::new(),
            create_only: Map::new(),
            routing: Map::new(),
            immutable: &[],
            global_only: false,
        }
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields.into_map();
        self
    }

    pub fn create_only(mut self, fields: Fields) -> Self {
        self.create_only = fields.into_map();
        self
    }

    pub fn routing(mut self, fields: Fields) -> Self {
        self.routing = fields.into_map();
        self
    }

    pub fn immutable(mut self, fields: &'static [&'static str]) -> Self {
        self.immutable = fields;
        self
    }

    pub fn global_only(mut self) -> Self {
        self.global_only = true;
        self
    }

    fn create_payload(&self) -> Value {
        let mut payload = self.create_only.clone();
        payload.extend(self.fields.clone());
        payload.extend(self.routing.clone());
        Value::Object(payload)
    }
}

/// Observe the single object matching `filter`
///
/// A filter naming an object that exists only in a dry run matches nothing
/// without asking the backend.
pub(crate) async fn observe(
    ctx: &Context,
    kind: ResourceKind,
    filter: &Filter,
    global_only: bool,
) -> Result<Option<Record>, CloudError> {
    if filter.iter().any(|(_, v)| is_placeholder(v)) {
        return Ok(None);
    }
    let mut found: Vec<Record> = ctx
        .cloud
        .list(kind, filter)
        .await?
        .into_iter()
        .filter(|r| !global_only || is_global(r))
        .collect();
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        n => Err(CloudError::Ambiguous(format!(
            "{} matching {} has {} objects",
            kind, filter, n
        ))),
    }
}

/// Generic create-or-patch of one object
pub(crate) async fn converge(ctx: &Context, desired: Desired) -> StepResult {
    let kind = desired.kind;
    let observed = observe(ctx, kind, &desired.filter, desired.global_only).await?;

    let Some(observed) = observed else {
        if ctx.dry_run {
            let id = placeholder(&desired.key);
            ctx.resolver.insert(kind, &desired.key, id.clone()).await;
            return Ok(Step::new(Outcome::Created, id));
        }
        debug!(kind = %kind, key = %desired.key, "Creating");
        let record = ctx.cloud.create(kind, &desired.create_payload()).await?;
        ctx.resolver.insert(kind, &desired.key, record.id.clone()).await;
        return Ok(Step::new(Outcome::Created, record.id.clone()).with_record(record));
    };

    ctx.resolver
        .insert(kind, &desired.key, observed.id.clone())
        .await;

    for field in desired.immutable {
        if let Some(want) = desired.fields.get(*field)
            && diff::differs(want, observed.get(field)).is_some()
        {
            let have = observed.get(field).cloned().unwrap_or(Value::Null);
            return Err(CloudError::BadRequest(format!(
                "{} '{}' cannot be changed in place ({} -> {})",
                kind, field, have, want
            ))
            .into());
        }
    }

    let patch = diff::patch(&desired.fields, &observed.fields);
    if patch.is_empty() {
        return Ok(Step::new(Outcome::Unchanged, observed.id.clone()).with_record(observed));
    }

    let detail = format!(
        "patched: {}",
        patch.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    if ctx.dry_run {
        return Ok(Step::new(Outcome::Updated, observed.id.clone())
            .with_detail(detail)
            .with_record(observed));
    }

    debug!(kind = %kind, key = %desired.key, detail = %detail, "Updating");
    let mut body = patch;
    body.extend(desired.routing.clone());
    let record = ctx
        .cloud
        .update(kind, &observed.id, &Value::Object(body))
        .await?;
    Ok(Step::new(Outcome::Updated, observed.id.clone())
        .with_detail(detail)
        .with_record(record))
}

/// Run the reconciler of one task
pub async fn dispatch(task: &Task, ctx: &Context) -> ReportEntry {
    let result = match &task.op {
        Op::Domain {
            name,
            description,
            enabled,
        } => identity::domain(ctx, name, description.as_deref(), *enabled).await,
        Op::DomainConfig { domain, config } => identity::domain_config(ctx, domain, config).await,
        Op::Role { role, domain } => identity::role(ctx, &task.key, role, domain.as_deref()).await,
        Op::RoleInference(inference) => identity::role_inference(ctx, &task.key, inference).await,
        Op::Project {
            domain,
            name,
            description,
            enabled,
            parent,
            tags,
        } => {
            identity::project(
                ctx,
                &task.key,
                identity::ProjectFields {
                    domain,
                    name,
                    description: description.as_deref(),
                    enabled: *enabled,
                    parent: parent.as_deref(),
                    tags,
                },
            )
            .await
        }
        Op::User { domain, user } => identity::user(ctx, &task.key, domain, user).await,
        Op::Group { domain, group } => identity::group(ctx, &task.key, domain, group).await,
        Op::GroupMembership {
            group,
            users,
            exclusive,
        } => access::membership(ctx, group, users, *exclusive).await,
        Op::RoleAssignment(assignment) => identity::assignment(ctx, &task.key, assignment).await,
        Op::Region(region) => catalog::region(ctx, region).await,
        Op::Service(service) => catalog::service(ctx, service).await,
        Op::Endpoint { service, endpoint } => {
            catalog::endpoint(ctx, &task.key, service, endpoint).await
        }
        Op::Quota { project, values } => quota::quota(ctx, task.kind, project, values).await,
        Op::AddressScope { project, scope } => {
            network::address_scope(ctx, &task.key, project, scope).await
        }
        Op::SubnetPool { project, pool } => {
            network::subnet_pool(ctx, &task.key, project, pool).await
        }
        Op::Network { project, network } => {
            network::network(ctx, &task.key, project, network).await
        }
        Op::Subnet {
            project,
            network,
            subnet,
        } => network::subnet(ctx, &task.key, project, network, subnet).await,
        Op::Port {
            project,
            network,
            port,
        } => network::port(ctx, &task.key, project, network, port).await,
        Op::Router { project, router } => network::router(ctx, &task.key, project, router).await,
        Op::RbacPolicy(policy) => network::rbac_policy(ctx, &task.key, policy).await,
        Op::SwiftAccount { project } => storage::swift_account(ctx, project).await,
        Op::SwiftContainer { project, container } => {
            storage::swift_container(ctx, &task.key, project, container).await
        }
        Op::Zone { project, zone } => dns::zone(ctx, &task.key, project, zone).await,
        Op::Recordset {
            project,
            zone,
            recordset,
        } => dns::recordset(ctx, &task.key, project, zone, recordset).await,
        Op::TsigKey { project, tsigkey } => dns::tsigkey(ctx, &task.key, project, tsigkey).await,
        Op::Flavor(flavor) => compute::flavor(ctx, flavor).await,
        Op::ShareType(share_type) => storage::share_type(ctx, share_type).await,
        Op::VolumeType(volume_type) => storage::volume_type(ctx, volume_type).await,
        Op::Access {
            resource,
            projects,
            exclusive,
        } => access::access(ctx, task.kind, resource, projects, *exclusive).await,
        Op::Placement { name } => compute::placement(ctx, task.kind, name).await,
    };

    let label = task.label();
    match result {
        Ok(step) => {
            info!(object = %label, outcome = %step.outcome, "Reconciled");
            let mut entry = ReportEntry::new(task.kind, label, step.outcome);
            entry.id = step.id;
            entry.detail = step.detail;
            entry
        }
        Err(failure) => {
            warn!(object = %label, error = %failure.error, "Reconcile failed");
            let mut entry = ReportEntry::failed(task.kind, label, &failure.error);
            entry.detail = failure.detail;
            entry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_skip_absent_values() {
        let fields = Fields::new()
            .set("name", "ops")
            .opt("description", None::<String>)
            .opt("enabled", Some(true))
            .non_empty("tags", json!([]))
            .into_map();
        assert_eq!(Value::Object(fields), json!({"name": "ops", "enabled": true}));
    }

    #[test]
    fn test_create_payload_merges_all_field_sets() {
        let desired = Desired::new(ResourceKind::Zone, "example.com.@ops@acme", Filter::new())
            .fields(Fields::new().set("email", "hostmaster@example.com"))
            .create_only(Fields::new().set("name", "example.com."))
            .routing(Fields::new().set("project_id", "p1"));
        assert_eq!(
            desired.create_payload(),
            json!({"name": "example.com.", "email": "hostmaster@example.com", "project_id": "p1"})
        );
    }
}
