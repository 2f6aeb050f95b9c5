//! Canonicalisation of a freshly parsed document
//!
//! Normalisation is idempotent: running it on its own output changes
//! nothing, which is what makes load -> dump -> load stable.

use crate::key::{self, NETWORK_SEGMENTS, PROJECT_SEGMENTS, SUBNET_SEGMENTS};
use crate::model::*;
use std::collections::BTreeSet;

pub fn normalize(doc: &mut SpecDocument) {
    for role in &mut doc.roles {
        trim(&mut role.name);
    }
    for inference in &mut doc.role_inferences {
        trim(&mut inference.prior_role);
        trim(&mut inference.implied_role);
        inference.prior_role = key::qualify(&inference.prior_role, &[], 1);
        inference.implied_role = key::qualify(&inference.implied_role, &[], 1);
    }
    for region in &mut doc.regions {
        trim(&mut region.region);
        trim_opt(&mut region.parent_region);
    }
    for service in &mut doc.services {
        normalize_service(service);
    }
    for flavor in &mut doc.flavors {
        trim(&mut flavor.name);
        trim_opt(&mut flavor.id);
        normalize_access(flavor.access.as_mut());
    }
    for share_type in &mut doc.share_types {
        trim(&mut share_type.name);
        normalize_access(share_type.access.as_mut());
    }
    for volume_type in &mut doc.volume_types {
        trim(&mut volume_type.name);
        normalize_access(volume_type.access.as_mut());
    }
    for name in doc.resource_classes.iter_mut().chain(doc.traits.iter_mut()) {
        *name = name.trim().to_uppercase();
    }
    for policy in &mut doc.rbac_policies {
        policy.object_type = policy.object_type.trim().to_lowercase();
        policy.action = policy.action.trim().to_lowercase();
        policy.object = key::qualify(&policy.object, &[], NETWORK_SEGMENTS);
        trim(&mut policy.target_project);
    }
    for domain in &mut doc.domains {
        normalize_domain(domain);
    }
}

fn normalize_service(service: &mut ServiceSpec) {
    service.name = service.name.trim().to_lowercase();
    service.service_type = service.service_type.trim().to_lowercase();
    service.enabled.get_or_insert(true);
    for endpoint in &mut service.endpoints {
        trim(&mut endpoint.region);
        trim(&mut endpoint.url);
        endpoint.enabled.get_or_insert(true);
    }
}

fn normalize_access(access: Option<&mut AccessList>) {
    if let Some(access) = access {
        for project in &mut access.projects {
            trim(project);
        }
    }
}

fn normalize_domain(domain: &mut DomainSpec) {
    trim(&mut domain.name);
    domain.enabled.get_or_insert(true);
    for role in &mut domain.roles {
        trim(&mut role.name);
    }

    let dom = domain.name.clone();
    let scope = [dom.as_str()];
    let local_roles: BTreeSet<String> = domain.roles.iter().map(|r| r.name.clone()).collect();
    let roles = RoleNames {
        domain: &dom,
        local: &local_roles,
    };

    for assignment in &mut domain.role_assignments {
        normalize_assignment(assignment, &scope, &roles);
    }
    for user in &mut domain.users {
        trim(&mut user.name);
        trim_opt(&mut user.email);
        user.enabled.get_or_insert(true);
        if let Some(project) = user.default_project.as_mut() {
            *project = key::qualify(project, &scope, PROJECT_SEGMENTS);
        }
        for assignment in &mut user.role_assignments {
            normalize_assignment(assignment, &scope, &roles);
        }
    }
    for group in &mut domain.groups {
        trim(&mut group.name);
        for user in &mut group.users {
            *user = key::qualify(user, &scope, PROJECT_SEGMENTS);
        }
        for assignment in &mut group.role_assignments {
            normalize_assignment(assignment, &scope, &roles);
        }
    }
    for project in &mut domain.projects {
        normalize_project(project, &dom, &roles);
    }
}

/// Roles visible from inside a domain
struct RoleNames<'a> {
    domain: &'a str,
    local: &'a BTreeSet<String>,
}

impl RoleNames<'_> {
    /// A bare name of a role declared in the same domain refers to that role;
    /// any other bare name refers to a global role.
    fn qualify(&self, role: &str) -> String {
        let role = role.trim();
        if !role.contains(key::SEPARATOR) && self.local.contains(role) {
            key::join(&[role, self.domain])
        } else {
            key::qualify(role, &[], 1)
        }
    }
}

fn normalize_assignment(assignment: &mut RoleAssignmentSpec, scope: &[&str], roles: &RoleNames) {
    assignment.role = roles.qualify(&assignment.role);
    if let Some(user) = assignment.user.as_mut() {
        *user = key::qualify(user, scope, PROJECT_SEGMENTS);
    }
    if let Some(group) = assignment.group.as_mut() {
        *group = key::qualify(group, scope, PROJECT_SEGMENTS);
    }
    if let Some(project) = assignment.project.as_mut() {
        *project = key::qualify(project, scope, PROJECT_SEGMENTS);
    }
    trim_opt(&mut assignment.domain);
    if let Some(system) = assignment.system.as_mut() {
        *system = system.trim().to_lowercase();
    }
}

fn normalize_project(project: &mut ProjectSpec, dom: &str, roles: &RoleNames) {
    trim(&mut project.name);
    project.enabled.get_or_insert(true);
    let domain_scope = [dom];
    if let Some(parent) = project.parent.as_mut() {
        *parent = key::qualify(parent, &domain_scope, PROJECT_SEGMENTS);
    }
    for tag in &mut project.tags {
        trim(tag);
    }
    for assignment in &mut project.role_assignments {
        normalize_assignment(assignment, &domain_scope, roles);
    }

    let name = project.name.clone();
    let scope = [name.as_str(), dom];

    for address_scope in &mut project.address_scopes {
        trim(&mut address_scope.name);
    }
    for pool in &mut project.subnet_pools {
        trim(&mut pool.name);
        for prefix in &mut pool.prefixes {
            trim(prefix);
        }
        if let Some(address_scope) = pool.address_scope.as_mut() {
            *address_scope = key::qualify(address_scope, &scope, NETWORK_SEGMENTS);
        }
    }
    for network in &mut project.networks {
        normalize_network(network, &scope);
    }
    for router in &mut project.routers {
        trim(&mut router.name);
        if let Some(gateway) = router.external_gateway.as_mut() {
            gateway.network = key::qualify(&gateway.network, &scope, NETWORK_SEGMENTS);
        }
        for interface in &mut router.interfaces {
            interface.subnet = key::qualify(&interface.subnet, &scope, SUBNET_SEGMENTS);
        }
    }
    if let Some(swift) = project.swift.as_mut() {
        swift.enabled.get_or_insert(true);
        for container in &mut swift.containers {
            trim(&mut container.name);
        }
    }
    for zone in &mut project.dns_zones {
        normalize_zone(zone);
    }
    for tsigkey in &mut project.dns_tsigkeys {
        trim(&mut tsigkey.name);
        tsigkey.algorithm = tsigkey.algorithm.trim().to_lowercase();
        trim_opt(&mut tsigkey.resource_id);
        if let Some(zone) = tsigkey.zone.as_mut() {
            *zone = key::fqdn(zone);
        }
    }
    for name in project
        .flavors
        .iter_mut()
        .chain(project.share_types.iter_mut())
        .chain(project.volume_types.iter_mut())
    {
        trim(name);
    }
}

fn normalize_network(network: &mut NetworkSpec, project_scope: &[&str]) {
    trim(&mut network.name);
    if let Some(provider) = network.provider.as_mut() {
        trim_opt(&mut provider.physical_network);
    }
    for subnet in &mut network.subnets {
        trim(&mut subnet.name);
        trim_opt(&mut subnet.cidr);
        trim_opt(&mut subnet.gateway_ip);
        if let Some(pool) = subnet.subnet_pool.as_mut() {
            *pool = key::qualify(pool, project_scope, NETWORK_SEGMENTS);
        }
    }

    let net = network.name.clone();
    let mut scope = vec![net.as_str()];
    scope.extend_from_slice(project_scope);
    for port in &mut network.ports {
        trim(&mut port.name);
        for fixed_ip in &mut port.fixed_ips {
            fixed_ip.subnet = key::qualify(&fixed_ip.subnet, &scope, SUBNET_SEGMENTS);
            trim_opt(&mut fixed_ip.ip_address);
        }
    }
}

fn normalize_zone(zone: &mut ZoneSpec) {
    zone.name = key::fqdn(&zone.name);
    trim(&mut zone.email);
    if let Some(zone_type) = zone.zone_type.as_mut() {
        *zone_type = zone_type.trim().to_uppercase();
    }
    for recordset in &mut zone.recordsets {
        recordset.name = key::recordset_fqdn(&recordset.name, &zone.name);
        recordset.record_type = recordset.record_type.trim().to_uppercase();
        for record in &mut recordset.records {
            trim(record);
        }
        recordset.records.sort();
    }
}

fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn trim_opt(value: &mut Option<String>) {
    if let Some(v) = value.as_mut() {
        trim(v);
    }
}
