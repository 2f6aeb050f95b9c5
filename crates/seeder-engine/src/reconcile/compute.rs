//! Flavors and placement resource classes and traits

use super::{Context, Desired, Fields, StepResult, converge};
use seeder_cloud::{Filter, ResourceKind};
use seeder_spec::FlavorSpec;
use serde_json::json;

/// Sizing and visibility cannot change once nova has the flavor
const FLAVOR_IMMUTABLE: &[&str] = &[
    "vcpus",
    "ram",
    "disk",
    "ephemeral",
    "swap",
    "rxtx_factor",
    "is_public",
];

pub(crate) async fn flavor(ctx: &Context, flavor: &FlavorSpec) -> StepResult {
    let desired = Desired::new(
        ResourceKind::Flavor,
        flavor.name.clone(),
        Filter::new().with("name", flavor.name.clone()),
    )
    .fields(
        Fields::new()
            .set("vcpus", flavor.vcpus)
            .set("ram", flavor.ram)
            .set("disk", flavor.disk)
            .opt("ephemeral", flavor.ephemeral)
            .opt("swap", flavor.swap)
            .opt("rxtx_factor", flavor.rxtx_factor)
            .set("is_public", flavor.visibility.is_public())
            .opt("description", flavor.description.clone())
            .non_empty("extra_specs", json!(flavor.extra_specs)),
    )
    .create_only(
        Fields::new()
            .set("name", flavor.name.clone())
            .opt("id", flavor.id.clone()),
    )
    .immutable(FLAVOR_IMMUTABLE);
    converge(ctx, desired).await
}

/// Custom resource classes and traits exist or not; they carry no fields
pub(crate) async fn placement(ctx: &Context, kind: ResourceKind, name: &str) -> StepResult {
    let desired = Desired::new(kind, name, Filter::new().with("name", name))
        .create_only(Fields::new().set("name", name));
    converge(ctx, desired).await
}
