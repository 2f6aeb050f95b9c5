//! Neutron objects
//!
//! Routers are the one multi-step object. Creating the router, setting its
//! gateway and attaching each interface are separate calls, and each is
//! checked by observation first, so a run that fails half way resumes from
//! the last state reached.

use super::{Context, Desired, Failure, Fields, Step, StepResult, converge};
use crate::diff;
use crate::resolver::is_placeholder;
use seeder_cloud::{CloudError, Filter, Outcome, ResourceKind};
use seeder_spec::{
    AddressScopeSpec, GatewaySpec, NetworkSpec, PortSpec, RbacPolicySpec, RouterInterfaceSpec,
    RouterSpec, SubnetPoolSpec, SubnetSpec,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::debug;

fn owned(name: &str, project_id: &str) -> Filter {
    Filter::new()
        .with("name", name)
        .with("project_id", project_id)
}

fn on_network(name: &str, network_id: &str) -> Filter {
    Filter::new()
        .with("name", name)
        .with("network_id", network_id)
}

pub(crate) async fn address_scope(
    ctx: &Context,
    key: &str,
    project: &str,
    scope: &AddressScopeSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let desired = Desired::new(
        ResourceKind::AddressScope,
        key,
        owned(&scope.name, &project_id),
    )
    .fields(
        Fields::new()
            .set("ip_version", scope.ip_version)
            .opt("shared", scope.shared),
    )
    .create_only(
        Fields::new()
            .set("name", scope.name.clone())
            .set("project_id", project_id),
    )
    .immutable(&["ip_version"]);
    converge(ctx, desired).await
}

pub(crate) async fn subnet_pool(
    ctx: &Context,
    key: &str,
    project: &str,
    pool: &SubnetPoolSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let address_scope = match &pool.address_scope {
        Some(scope) => Some(ctx.resolve(ResourceKind::AddressScope, scope).await?),
        None => None,
    };
    let desired = Desired::new(ResourceKind::SubnetPool, key, owned(&pool.name, &project_id))
        .fields(
            Fields::new()
                .set("prefixes", json!(pool.prefixes))
                .opt("default_prefixlen", pool.default_prefixlen)
                .opt("min_prefixlen", pool.min_prefixlen)
                .opt("max_prefixlen", pool.max_prefixlen)
                .opt("address_scope_id", address_scope)
                .opt("shared", pool.shared)
                .opt("is_default", pool.is_default)
                .opt("description", pool.description.clone()),
        )
        .create_only(
            Fields::new()
                .set("name", pool.name.clone())
                .set("project_id", project_id),
        )
        .immutable(&["shared"]);
    converge(ctx, desired).await
}

/// Provider attributes are fixed at creation
pub(crate) async fn network(
    ctx: &Context,
    key: &str,
    project: &str,
    network: &NetworkSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let mut create = Fields::new()
        .set("name", network.name.clone())
        .set("project_id", project_id.clone());
    if let Some(provider) = &network.provider {
        create = create
            .set("provider:network_type", provider.network_type.as_str())
            .opt("provider:physical_network", provider.physical_network.clone())
            .opt("provider:segmentation_id", provider.segmentation_id);
    }
    let desired = Desired::new(ResourceKind::Network, key, owned(&network.name, &project_id))
        .fields(
            Fields::new()
                .opt("description", network.description.clone())
                .opt("admin_state_up", network.admin_state_up)
                .opt("shared", network.shared)
                .opt("router:external", network.external)
                .opt("mtu", network.mtu),
        )
        .create_only(create);
    converge(ctx, desired).await
}

pub(crate) async fn subnet(
    ctx: &Context,
    key: &str,
    project: &str,
    network: &str,
    subnet: &SubnetSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let network_id = ctx.resolve(ResourceKind::Network, network).await?;
    let pool = match &subnet.subnet_pool {
        Some(pool) => Some(ctx.resolve(ResourceKind::SubnetPool, pool).await?),
        None => None,
    };
    let desired = Desired::new(ResourceKind::Subnet, key, on_network(&subnet.name, &network_id))
        .fields(
            Fields::new()
                .opt("cidr", subnet.cidr.clone())
                .set("ip_version", subnet.ip_version)
                .opt("gateway_ip", subnet.gateway_ip.clone())
                .opt("enable_dhcp", subnet.enable_dhcp)
                .non_empty("dns_nameservers", json!(subnet.dns_nameservers))
                .opt("description", subnet.description.clone()),
        )
        .create_only(
            Fields::new()
                .set("name", subnet.name.clone())
                .set("network_id", network_id)
                .set("project_id", project_id)
                .opt("subnetpool_id", pool),
        )
        .immutable(&["cidr", "ip_version"]);
    converge(ctx, desired).await
}

/// Fixed IPs are requested on create only; neutron reports the allocated
/// addresses back, which the spec may leave out
pub(crate) async fn port(
    ctx: &Context,
    key: &str,
    project: &str,
    network: &str,
    port: &PortSpec,
) -> StepResult {
    let project_id = ctx.resolve(ResourceKind::Project, project).await?;
    let network_id = ctx.resolve(ResourceKind::Network, network).await?;
    let mut fixed_ips = Vec::with_capacity(port.fixed_ips.len());
    for fixed_ip in &port.fixed_ips {
        let subnet_id = ctx.resolve(ResourceKind::Subnet, &fixed_ip.subnet).await?;
        let mut entry = json!({ "subnet_id": subnet_id });
        if let Some(address) = &fixed_ip.ip_address {
            entry["ip_address"] = json!(address);
        }
        fixed_ips.push(entry);
    }
    let desired = Desired::new(ResourceKind::Port, key, on_network(&port.name, &network_id))
        .fields(
            Fields::new()
                .opt("description", port.description.clone())
                .opt("admin_state_up", port.admin_state_up),
        )
        .create_only(
            Fields::new()
                .set("name", port.name.clone())
                .set("network_id", network_id)
                .set("project_id", project_id)
                .non_empty("fixed_ips", Value::Array(fixed_ips)),
        );
    converge(ctx, desired).await
}

/// Progress of a router through its creation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum RouterState {
    Absent,
    PresentNoGw,
    PresentGwOnly,
    PresentWithInterfaces,
    PresentFinal,
}

impl RouterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouterState::Absent => "absent",
            RouterState::PresentNoGw => "present-no-gw",
            RouterState::PresentGwOnly => "present-gw-only",
            RouterState::PresentWithInterfaces => "present-with-interfaces",
            RouterState::PresentFinal => "present-final",
        }
    }
}

impl std::fmt::Display for RouterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router walk: create, set gateway, attach interfaces
struct RouterRun<'a> {
    ctx: &'a Context,
    state: RouterState,
    changes: Vec<String>,
}

impl RouterRun<'_> {
    fn advance(&mut self, state: RouterState) {
        debug!(from = %self.state, to = %state, "Router transition");
        self.state = state;
    }

    /// Failure that names the last state reached
    fn stalled(&self, error: CloudError) -> Failure {
        Failure {
            error,
            detail: Some(format!("router left in state {}", self.state)),
        }
    }

    async fn gateway(
        &mut self,
        router_id: &str,
        current: Option<&Value>,
        gateway: &GatewaySpec,
    ) -> Result<(), Failure> {
        let network_id = self
            .ctx
            .resolve(ResourceKind::Network, &gateway.network)
            .await
            .map_err(|e| self.stalled(e))?;
        let mut want = json!({ "network_id": network_id });
        if let Some(snat) = gateway.enable_snat {
            want["enable_snat"] = json!(snat);
        }
        if diff::differs(&want, current).is_none() {
            return Ok(());
        }
        self.changes.push("gateway".into());
        if !self.ctx.dry_run && !is_placeholder(router_id) {
            self.ctx
                .cloud
                .update(
                    ResourceKind::Router,
                    router_id,
                    &json!({ "external_gateway_info": want }),
                )
                .await
                .map_err(|e| self.stalled(e))?;
        }
        Ok(())
    }

    async fn interfaces(
        &mut self,
        router_id: &str,
        interfaces: &[RouterInterfaceSpec],
    ) -> Result<(), Failure> {
        let filter = Filter::new().with("router_id", router_id);
        let attached: BTreeSet<String> = if is_placeholder(router_id) {
            BTreeSet::new()
        } else {
            self.ctx
                .cloud
                .list(ResourceKind::RouterInterface, &filter)
                .await
                .map_err(|e| self.stalled(e))?
                .iter()
                .filter_map(|r| r.str("subnet_id").map(str::to_string))
                .collect()
        };

        for interface in interfaces {
            let subnet_id = self
                .ctx
                .resolve(ResourceKind::Subnet, &interface.subnet)
                .await
                .map_err(|e| self.stalled(e))?;
            if attached.contains(&subnet_id) {
                continue;
            }
            self.changes.push(format!("interface {}", interface.subnet));
            if !self.ctx.dry_run {
                self.ctx
                    .cloud
                    .create(
                        ResourceKind::RouterInterface,
                        &json!({ "router_id": router_id, "subnet_id": subnet_id }),
                    )
                    .await
                    .map_err(|e| self.stalled(e))?;
            }
            self.advance(RouterState::PresentWithInterfaces);
        }
        Ok(())
    }
}

pub(crate) async fn router(
    ctx: &Context,
    key: &str,
    project: &str,
    router: &RouterSpec,
) -> StepResult {
    let mut run = RouterRun {
        ctx,
        state: RouterState::Absent,
        changes: Vec::new(),
    };

    let project_id = ctx
        .resolve(ResourceKind::Project, project)
        .await
        .map_err(|e| run.stalled(e))?;
    let desired = Desired::new(ResourceKind::Router, key, owned(&router.name, &project_id))
        .fields(
            Fields::new()
                .opt("description", router.description.clone())
                .opt("admin_state_up", router.admin_state_up),
        )
        .create_only(
            Fields::new()
                .set("name", router.name.clone())
                .set("project_id", project_id),
        );
    let core: Step = converge(ctx, desired).await.map_err(|f| Failure {
        detail: Some(format!("router left in state {}", RouterState::Absent)),
        ..f
    })?;
    let router_id = core.id.clone().unwrap_or_default();
    run.advance(RouterState::PresentNoGw);

    if let Some(gateway) = &router.external_gateway {
        let current = core
            .record
            .as_ref()
            .and_then(|r| r.get("external_gateway_info"))
            .filter(|v| !v.is_null());
        run.gateway(&router_id, current, gateway).await?;
        run.advance(RouterState::PresentGwOnly);
    }
    if !router.interfaces.is_empty() {
        run.interfaces(&router_id, &router.interfaces).await?;
    }
    run.advance(RouterState::PresentFinal);

    let mut detail: Vec<String> = core.detail.into_iter().collect();
    detail.extend(run.changes.iter().cloned());
    let outcome = match core.outcome {
        Outcome::Unchanged if !run.changes.is_empty() => Outcome::Updated,
        other => other,
    };
    Ok(Step {
        outcome,
        id: core.id,
        detail: (!detail.is_empty()).then(|| detail.join("; ")),
        record: core.record,
    })
}

/// `*` targets every project
pub(crate) async fn rbac_policy(ctx: &Context, key: &str, policy: &RbacPolicySpec) -> StepResult {
    let object_id = ctx.resolve(ResourceKind::Network, &policy.object).await?;
    let target = if policy.target_project == "*" {
        "*".to_string()
    } else {
        ctx.resolve(ResourceKind::Project, &policy.target_project)
            .await?
    };
    let filter = Filter::new()
        .with("object_type", policy.object_type.clone())
        .with("object_id", object_id.clone())
        .with("action", policy.action.clone())
        .with("target_tenant", target.clone());
    let desired = Desired::new(ResourceKind::RbacPolicy, key, filter).create_only(
        Fields::new()
            .set("object_type", policy.object_type.clone())
            .set("object_id", object_id)
            .set("action", policy.action.clone())
            .set("target_tenant", target),
    );
    converge(ctx, desired).await
}
