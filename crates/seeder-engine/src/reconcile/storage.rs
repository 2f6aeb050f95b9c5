//! Share types, volume types and swift

use super::{Context, Desired, Fields, StepResult, converge};
use seeder_cloud::{Filter, ResourceKind};
use seeder_spec::{ContainerSpec, ShareTypeSpec, VolumeTypeSpec};
use serde_json::json;

/// Manila keeps required and optional specs in one `extra_specs` map
pub(crate) async fn share_type(ctx: &Context, share_type: &ShareTypeSpec) -> StepResult {
    let mut specs = share_type.specs.clone();
    specs.extend(share_type.extra_specs.clone());
    let desired = Desired::new(
        ResourceKind::ShareType,
        share_type.name.clone(),
        Filter::new().with("name", share_type.name.clone()),
    )
    .fields(
        Fields::new()
            .opt("description", share_type.description.clone())
            .set("is_public", share_type.visibility.is_public())
            .non_empty("extra_specs", json!(specs)),
    )
    .create_only(Fields::new().set("name", share_type.name.clone()));
    converge(ctx, desired).await
}

pub(crate) async fn volume_type(ctx: &Context, volume_type: &VolumeTypeSpec) -> StepResult {
    let desired = Desired::new(
        ResourceKind::VolumeType,
        volume_type.name.clone(),
        Filter::new().with("name", volume_type.name.clone()),
    )
    .fields(
        Fields::new()
            .opt("description", volume_type.description.clone())
            .set("is_public", volume_type.visibility.is_public())
            .non_empty("extra_specs", json!(volume_type.extra_specs)),
    )
    .create_only(Fields::new().set("name", volume_type.name.clone()));
    converge(ctx, desired).await
}

pub(crate) async fn swift_account(ctx: &Context, project: &str) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let desired = Desired::new(
        ResourceKind::SwiftAccount,
        project,
        Filter::new().with("project_id", project_id.clone()),
    )
    .create_only(Fields::new().set("project_id", project_id));
    converge(ctx, desired).await
}

/// Containers are addressed by project and name on every write
pub(crate) async fn swift_container(
    ctx: &Context,
    key: &str,
    project: &str,
    container: &ContainerSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let desired = Desired::new(
        ResourceKind::SwiftContainer,
        key,
        Filter::new()
            .with("project_id", project_id.clone())
            .with("name", container.name.clone()),
    )
    .fields(
        Fields::new()
            .non_empty("metadata", json!(container.metadata))
            .opt("read_acl", container.read_acl.clone())
            .opt("write_acl", container.write_acl.clone()),
    )
    .routing(
        Fields::new()
            .set("project_id", project_id)
            .set("name", container.name.clone()),
    );
    converge(ctx, desired).await
}
