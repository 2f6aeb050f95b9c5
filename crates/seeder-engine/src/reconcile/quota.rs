//! Quota sets
//!
//! A quota set always exists and lists every enforced key. Only the keys
//! named in the spec are compared; `0` is an enforced zero and `-1` means
//! unlimited, both sent as written.

use super::{Context, Desired, Fields, Failure, StepResult, converge};
use seeder_cloud::{CloudError, Filter, ResourceKind};
use std::collections::BTreeMap;
use tracing::warn;

pub(crate) async fn quota(
    ctx: &Context,
    kind: ResourceKind,
    project: &str,
    values: &BTreeMap<String, i64>,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let fields = values
        .iter()
        .fold(Fields::new(), |fields, (name, value)| fields.set(name, *value));
    let desired = Desired::new(
        kind,
        project,
        Filter::new().with("project_id", project_id.clone()),
    )
    .fields(fields)
    .routing(Fields::new().set("project_id", project_id));

    match converge(ctx, desired.clone()).await {
        // another writer raced us: observe again and retry once
        Err(Failure {
            error: CloudError::Conflict(message),
            ..
        }) => {
            warn!(kind = %kind, project, message = %message, "Quota write conflicted, retrying");
            converge(ctx, desired).await
        }
        other => other,
    }
}
