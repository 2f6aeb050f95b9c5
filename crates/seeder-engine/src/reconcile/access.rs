//! Set relations: group membership and project access grants
//!
//! The desired members are added when missing. Members present remotely
//! but absent from the spec are revoked only when the set is marked
//! exclusive.

use super::{Context, Failure, Step, StepResult};
use crate::resolver::is_placeholder;
use seeder_cloud::{CloudError, Filter, Outcome, ResourceKind};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// One relation set hanging off an owner object
pub(crate) struct Grants {
    pub kind: ResourceKind,
    pub key: String,
    /// Field naming the owner in records and payloads
    pub owner_field: &'static str,
    pub owner_id: String,
    /// Field naming a member in records and payloads
    pub member_field: &'static str,
    /// `(symbolic key, remote id)` of each desired member
    pub members: Vec<(String, String)>,
    pub exclusive: bool,
}

impl Grants {
    fn payload(&self, member_id: &str) -> Value {
        let mut payload = Map::new();
        payload.insert(self.owner_field.into(), Value::String(self.owner_id.clone()));
        payload.insert(self.member_field.into(), Value::String(member_id.to_string()));
        Value::Object(payload)
    }
}

pub(crate) async fn converge_grants(ctx: &Context, grants: Grants) -> StepResult {
    let observed: BTreeSet<String> = if is_placeholder(&grants.owner_id) {
        BTreeSet::new()
    } else {
        let filter = Filter::new().with(grants.owner_field, grants.owner_id.clone());
        ctx.cloud
            .list(grants.kind, &filter)
            .await?
            .iter()
            .filter_map(|r| r.str(grants.member_field).map(str::to_string))
            .collect()
    };
    ctx.resolver
        .insert(grants.kind, &grants.key, grants.owner_id.clone())
        .await;

    let desired: BTreeSet<&str> = grants.members.iter().map(|(_, id)| id.as_str()).collect();
    let mut added = Vec::new();
    let mut seen = BTreeSet::new();
    for (key, id) in &grants.members {
        if !observed.contains(id) && seen.insert(id.as_str()) {
            added.push((key.as_str(), id.as_str()));
        }
    }
    let removed: Vec<&str> = if grants.exclusive {
        observed
            .iter()
            .map(String::as_str)
            .filter(|id| !desired.contains(id))
            .collect()
    } else {
        Vec::new()
    };

    if added.is_empty() && removed.is_empty() {
        return Ok(Step::new(Outcome::Unchanged, grants.owner_id.clone()));
    }

    let mut done: Vec<String> = Vec::new();
    for (key, id) in &added {
        if !ctx.dry_run {
            debug!(kind = %grants.kind, owner = %grants.owner_id, member = %key, "Granting");
            ctx.cloud
                .create(grants.kind, &grants.payload(id))
                .await
                .map_err(|e| partial(e, &done))?;
        }
        done.push(format!("added {}", key));
    }
    for id in &removed {
        if !ctx.dry_run {
            debug!(kind = %grants.kind, owner = %grants.owner_id, member = %id, "Revoking");
            ctx.cloud
                .revoke(grants.kind, &grants.payload(id))
                .await
                .map_err(|e| partial(e, &done))?;
        }
        done.push(format!("removed {}", id));
    }

    let outcome = if observed.is_empty() && removed.is_empty() {
        Outcome::Created
    } else {
        Outcome::Updated
    };
    Ok(Step::new(outcome, grants.owner_id.clone()).with_detail(done.join("; ")))
}

fn partial(error: CloudError, done: &[String]) -> Failure {
    Failure {
        error,
        detail: (!done.is_empty()).then(|| done.join("; ")),
    }
}

async fn resolve_all(
    ctx: &Context,
    kind: ResourceKind,
    keys: &[String],
) -> Result<Vec<(String, String)>, CloudError> {
    let mut members = Vec::with_capacity(keys.len());
    for key in keys {
        members.push((key.clone(), ctx.resolve(kind, key).await?));
    }
    Ok(members)
}

pub(crate) async fn membership(
    ctx: &Context,
    group: &str,
    users: &[String],
    exclusive: bool,
) -> StepResult {
    let owner_id = ctx.resolve(ResourceKind::Group, group).await?;
    let members = resolve_all(ctx, ResourceKind::User, users).await?;
    converge_grants(
        ctx,
        Grants {
            kind: ResourceKind::GroupMembership,
            key: group.to_string(),
            owner_field: "group_id",
            owner_id,
            member_field: "user_id",
            members,
            exclusive,
        },
    )
    .await
}

/// Project access to a private flavor, share type or volume type
pub(crate) async fn access(
    ctx: &Context,
    kind: ResourceKind,
    resource: &str,
    projects: &[String],
    exclusive: bool,
) -> StepResult {
    let resource_kind = match kind {
        ResourceKind::FlavorAccess => ResourceKind::Flavor,
        ResourceKind::ShareTypeAccess => ResourceKind::ShareType,
        _ => ResourceKind::VolumeType,
    };
    let owner_id = ctx.resolve(resource_kind, resource).await?;
    let members = resolve_all(ctx, ResourceKind::Project, projects).await?;
    converge_grants(
        ctx,
        Grants {
            kind,
            key: resource.to_string(),
            owner_field: "resource_id",
            owner_id,
            member_field: "project_id",
            members,
            exclusive,
        },
    )
    .await
}
