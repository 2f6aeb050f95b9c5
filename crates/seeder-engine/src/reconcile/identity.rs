//! Keystone objects: domains, roles, projects, users, groups, assignments

use super::{Context, Desired, Fields, StepResult, converge};
use crate::plan::Assignment;
use seeder_cloud::{Filter, ResourceKind};
use seeder_spec::{ActorKind, GroupSpec, RoleInferenceSpec, RoleSpec, ScopeKind, UserSpec};
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub(crate) async fn domain(
    ctx: &Context,
    name: &str,
    description: Option<&str>,
    enabled: Option<bool>,
) -> StepResult {
    let desired = Desired::new(ResourceKind::Domain, name, Filter::new().with("name", name))
        .fields(
            Fields::new()
                .opt("description", description)
                .opt("enabled", enabled),
        )
        .create_only(Fields::new().set("name", name));
    converge(ctx, desired).await
}

/// Only the named options of the named groups are compared
pub(crate) async fn domain_config(
    ctx: &Context,
    domain: &str,
    config: &BTreeMap<String, BTreeMap<String, Value>>,
) -> StepResult {
    let domain_id = ctx.resolve(ResourceKind::Domain, domain).await?;
    let desired = Desired::new(
        ResourceKind::DomainConfig,
        domain,
        Filter::new().with("domain_id", domain_id.clone()),
    )
    .fields(Fields::new().set("config", json!(config)))
    .routing(Fields::new().set("domain_id", domain_id));
    converge(ctx, desired).await
}

pub(crate) async fn role(
    ctx: &Context,
    key: &str,
    role: &RoleSpec,
    domain: Option<&str>,
) -> StepResult {
    let mut filter = Filter::new().with("name", role.name.clone());
    let mut create = Fields::new().set("name", role.name.clone());
    if let Some(domain) = domain {
        let domain_id = ctx.resolve(ResourceKind::Domain, domain).await?;
        filter.insert("domain_id", domain_id.clone());
        create = create.set("domain_id", domain_id);
    }
    let mut desired = Desired::new(ResourceKind::Role, key, filter)
        .fields(Fields::new().opt("description", role.description.clone()))
        .create_only(create);
    if domain.is_none() {
        desired = desired.global_only();
    }
    converge(ctx, desired).await
}

pub(crate) async fn role_inference(
    ctx: &Context,
    key: &str,
    inference: &RoleInferenceSpec,
) -> StepResult {
    let prior = ctx.resolve(ResourceKind::Role, &inference.prior_role).await?;
    let implied = ctx
        .resolve(ResourceKind::Role, &inference.implied_role)
        .await?;
    let desired = Desired::new(
        ResourceKind::RoleInference,
        key,
        Filter::new()
            .with("prior_role_id", prior.clone())
            .with("implied_role_id", implied.clone()),
    )
    .create_only(
        Fields::new()
            .set("prior_role_id", prior)
            .set("implied_role_id", implied),
    );
    converge(ctx, desired).await
}

pub(crate) struct ProjectFields<'a> {
    pub domain: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub enabled: Option<bool>,
    pub parent: Option<&'a str>,
    pub tags: &'a [String],
}

/// Keystone refuses to move a project, so the parent is compared but never
/// patched
pub(crate) async fn project(ctx: &Context, key: &str, project: ProjectFields<'_>) -> StepResult {
    let domain_id = ctx.resolve(ResourceKind::Domain, project.domain).await?;
    let parent_id = match project.parent {
        Some(parent) => Some(ctx.resolve(ResourceKind::Project, parent).await?),
        None => None,
    };
    let desired = Desired::new(
        ResourceKind::Project,
        key,
        Filter::new()
            .with("name", project.name)
            .with("domain_id", domain_id.clone()),
    )
    .fields(
        Fields::new()
            .opt("description", project.description)
            .opt("enabled", project.enabled)
            .non_empty("tags", json!(project.tags))
            .opt("parent_id", parent_id),
    )
    .create_only(
        Fields::new()
            .set("name", project.name)
            .set("domain_id", domain_id),
    )
    .immutable(&["parent_id"]);
    converge(ctx, desired).await
}

/// The password is sent on create only and never compared
pub(crate) async fn user(ctx: &Context, key: &str, domain: &str, user: &UserSpec) -> StepResult {
    let domain_id = ctx.resolve(ResourceKind::Domain, domain).await?;
    let default_project = match &user.default_project {
        Some(project) => Some(ctx.resolve(ResourceKind::Project, project).await?),
        None => None,
    };
    let desired = Desired::new(
        ResourceKind::User,
        key,
        Filter::new()
            .with("name", user.name.clone())
            .with("domain_id", domain_id.clone()),
    )
    .fields(
        Fields::new()
            .opt("description", user.description.clone())
            .opt("email", user.email.clone())
            .opt("enabled", user.enabled)
            .opt("default_project_id", default_project),
    )
    .create_only(
        Fields::new()
            .set("name", user.name.clone())
            .set("domain_id", domain_id)
            .opt("password", user.password.clone()),
    );
    converge(ctx, desired).await
}

pub(crate) async fn group(ctx: &Context, key: &str, domain: &str, group: &GroupSpec) -> StepResult {
    let domain_id = ctx.resolve(ResourceKind::Domain, domain).await?;
    let desired = Desired::new(
        ResourceKind::Group,
        key,
        Filter::new()
            .with("name", group.name.clone())
            .with("domain_id", domain_id.clone()),
    )
    .fields(Fields::new().opt("description", group.description.clone()))
    .create_only(
        Fields::new()
            .set("name", group.name.clone())
            .set("domain_id", domain_id),
    );
    converge(ctx, desired).await
}

/// Assignments are tuples: present or granted, never updated
pub(crate) async fn assignment(ctx: &Context, key: &str, assignment: &Assignment) -> StepResult {
    let role_id = ctx.resolve(ResourceKind::Role, &assignment.role).await?;
    let (actor_field, actor_kind) = match assignment.actor.kind {
        ActorKind::User => ("user_id", ResourceKind::User),
        ActorKind::Group => ("group_id", ResourceKind::Group),
    };
    let actor_id = ctx.resolve(actor_kind, &assignment.actor.key).await?;
    let (scope_field, scope_id) = match assignment.scope.kind {
        ScopeKind::Project => (
            "project_id",
            ctx.resolve(ResourceKind::Project, &assignment.scope.key)
                .await?,
        ),
        ScopeKind::Domain => (
            "domain_id",
            ctx.resolve(ResourceKind::Domain, &assignment.scope.key)
                .await?,
        ),
        ScopeKind::System => ("system", assignment.scope.key.clone()),
    };

    let filter = Filter::new()
        .with(actor_field, actor_id.clone())
        .with("role_id", role_id.clone())
        .with(scope_field, scope_id.clone())
        .with("inherited", assignment.inherited.to_string());
    let desired = Desired::new(ResourceKind::RoleAssignment, key, filter).create_only(
        Fields::new()
            .set(actor_field, actor_id)
            .set("role_id", role_id)
            .set(scope_field, scope_id)
            .set("inherited", assignment.inherited),
    );
    converge(ctx, desired).await
}
