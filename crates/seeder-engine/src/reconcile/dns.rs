//! Designate zones, recordsets and TSIG keys
//!
//! Zones and recordsets are written on behalf of their project; the project
//! id travels as a routing field that the client turns into a sudo header.

use super::{Context, Desired, Fields, StepResult, converge};
use seeder_cloud::{Filter, ResourceKind};
use seeder_spec::{RecordsetSpec, TsigKeySpec, TsigScope, ZoneSpec, key};
use serde_json::json;

pub(crate) async fn zone(ctx: &Context, key: &str, project: &str, zone: &ZoneSpec) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let desired = Desired::new(
        ResourceKind::Zone,
        key,
        Filter::new()
            .with("name", zone.name.clone())
            .with("project_id", project_id.clone()),
    )
    .fields(
        Fields::new()
            .set("email", zone.email.clone())
            .opt("ttl", zone.ttl)
            .opt("description", zone.description.clone()),
    )
    .create_only(
        Fields::new()
            .set("name", zone.name.clone())
            .opt("type", zone.zone_type.clone()),
    )
    .routing(Fields::new().set("project_id", project_id));
    converge(ctx, desired).await
}

/// Keyed by zone, name and type; records are compared as a set
pub(crate) async fn recordset(
    ctx: &Context,
    key: &str,
    project: &str,
    zone: &str,
    recordset: &RecordsetSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let zone_id = ctx.resolve(ResourceKind::Zone, zone).await?;
    let mut records = recordset.records.clone();
    records.sort();

    let desired = Desired::new(
        ResourceKind::Recordset,
        key,
        Filter::new()
            .with("zone_id", zone_id.clone())
            .with("name", recordset.name.clone())
            .with("type", recordset.record_type.clone())
            .with("project_id", project_id.clone()),
    )
    .fields(
        Fields::new()
            .set("records", json!(records))
            .opt("ttl", recordset.ttl)
            .opt("description", recordset.description.clone()),
    )
    .create_only(
        Fields::new()
            .set("name", recordset.name.clone())
            .set("type", recordset.record_type.clone()),
    )
    .routing(
        Fields::new()
            .set("zone_id", zone_id)
            .set("project_id", project_id),
    );
    converge(ctx, desired).await
}

/// Zone-scoped keys point at a zone of the same project, pool-scoped keys
/// at a pool id given verbatim
pub(crate) async fn tsigkey(
    ctx: &Context,
    key: &str,
    project: &str,
    tsigkey: &TsigKeySpec,
) -> StepResult {
    let resource_id = match (tsigkey.scope, &tsigkey.zone) {
        (TsigScope::Zone, Some(zone)) => Some(
            ctx.resolve(ResourceKind::Zone, &key::join(&[zone.as_str(), project]))
                .await?,
        ),
        _ => tsigkey.resource_id.clone(),
    };
    let desired = Desired::new(
        ResourceKind::TsigKey,
        key,
        Filter::new().with("name", tsigkey.name.clone()),
    )
    .fields(
        Fields::new()
            .set("algorithm", tsigkey.algorithm.clone())
            .set("secret", tsigkey.secret.clone())
            .set("scope", tsigkey.scope.as_wire())
            .opt("resource_id", resource_id),
    )
    .create_only(Fields::new().set("name", tsigkey.name.clone()));
    converge(ctx, desired).await
}
