//! Service catalog: regions, services, endpoints

use super::{Context, Desired, Fields, StepResult, converge};
use seeder_cloud::{Filter, ResourceKind};
use seeder_spec::{EndpointSpec, RegionSpec, ServiceSpec};

pub(crate) async fn region(ctx: &Context, region: &RegionSpec) -> StepResult {
    let parent = match &region.parent_region {
        Some(parent) => Some(ctx.resolve(ResourceKind::Region, parent).await?),
        None => None,
    };
    let desired = Desired::new(
        ResourceKind::Region,
        region.region.clone(),
        Filter::new().with("id", region.region.clone()),
    )
    .fields(
        Fields::new()
            .opt("description", region.description.clone())
            .opt("parent_region_id", parent),
    )
    .create_only(Fields::new().set("id", region.region.clone()));
    converge(ctx, desired).await
}

pub(crate) async fn service(ctx: &Context, service: &ServiceSpec) -> StepResult {
    let desired = Desired::new(
        ResourceKind::Service,
        service.name.clone(),
        Filter::new().with("name", service.name.clone()),
    )
    .fields(
        Fields::new()
            .set("type", service.service_type.clone())
            .opt("description", service.description.clone())
            .opt("enabled", service.enabled),
    )
    .create_only(Fields::new().set("name", service.name.clone()));
    converge(ctx, desired).await
}

/// Keyed by service, region and interface; the URL is what usually moves
pub(crate) async fn endpoint(
    ctx: &Context,
    key: &str,
    service: &str,
    endpoint: &EndpointSpec,
) -> StepResult {
    let service_id = ctx.resolve(ResourceKind::Service, service).await?;
    let region_id = ctx.resolve(ResourceKind::Region, &endpoint.region).await?;
    let interface = endpoint.interface.as_str();
    let desired = Desired::new(
        ResourceKind::Endpoint,
        key,
        Filter::new()
            .with("service_id", service_id.clone())
            .with("region_id", region_id.clone())
            .with("interface", interface),
    )
    .fields(
        Fields::new()
            .set("url", endpoint.url.clone())
            .opt("enabled", endpoint.enabled),
    )
    .create_only(
        Fields::new()
            .set("service_id", service_id)
            .set("region_id", region_id)
            .set("interface", interface),
    );
    converge(ctx, desired).await
}
