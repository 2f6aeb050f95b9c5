//! Structural and cross-reference validation of a normalised document
//!
//! Every problem is collected; the caller rejects the document as a whole.

use crate::key::{self, DOMAIN_SEGMENTS, NETWORK_SEGMENTS, PROJECT_SEGMENTS, SUBNET_SEGMENTS};
use crate::model::*;
use std::collections::{BTreeMap, BTreeSet};

const RBAC_ACTIONS: [&str; 2] = ["access_as_shared", "access_as_external"];
const ZONE_TYPES: [&str; 2] = ["PRIMARY", "SECONDARY"];

/// Validate `doc`, returning the list of problems (empty when valid)
pub fn validate(doc: &SpecDocument) -> Vec<String> {
    let mut v = Validator::default();
    v.document(doc);
    v.problems
}

#[derive(Default)]
struct Validator {
    problems: Vec<String>,
}

impl Validator {
    fn problem(&mut self, at: &str, message: impl std::fmt::Display) {
        self.problems.push(format!("{}: {}", at, message));
    }

    fn name(&mut self, at: &str, name: &str) {
        if name.is_empty() {
            self.problem(at, "name must not be empty");
        } else if name.contains(key::SEPARATOR) {
            self.problem(at, format!("name '{}' must not contain '@'", name));
        }
    }

    fn unique<'a>(&mut self, at: &str, what: &str, names: impl IntoIterator<Item = &'a str>) {
        let mut seen = BTreeSet::new();
        for name in names {
            if !seen.insert(name) {
                self.problem(at, format!("duplicate {} '{}'", what, name));
            }
        }
    }

    fn key(&mut self, at: &str, field: &str, value: &str, segments: usize) {
        if !key::is_qualified(value, segments) {
            self.problem(
                at,
                format!(
                    "{} '{}' is not a valid key (expected {} '@'-separated segments)",
                    field, value, segments
                ),
            );
        }
    }

    fn role_key(&mut self, at: &str, field: &str, role: &str) {
        if !(key::is_qualified(role, 1) || key::is_qualified(role, PROJECT_SEGMENTS)) {
            self.problem(at, format!("{} '{}' is not a valid role key", field, role));
        }
    }

    fn quota(&mut self, at: &str, field: &str, quota: &BTreeMap<String, i64>) {
        for (name, value) in quota {
            if name.trim().is_empty() {
                self.problem(at, format!("{} has an empty key", field));
            }
            if *value < -1 {
                self.problem(
                    at,
                    format!("{}.{} = {} is below -1 (unlimited)", field, name, value),
                );
            }
        }
    }

    fn ip_version(&mut self, at: &str, version: u8) {
        if version != 4 && version != 6 {
            self.problem(at, format!("ip_version must be 4 or 6, got {}", version));
        }
    }

    fn document(&mut self, doc: &SpecDocument) {
        for role in &doc.roles {
            self.name(&format!("roles[{}]", role.name), &role.name);
        }
        self.unique("roles", "role", doc.roles.iter().map(|r| r.name.as_str()));

        for inference in &doc.role_inferences {
            let at = format!("role_inferences[{}]", inference.prior_role);
            self.role_key(&at, "prior_role", &inference.prior_role);
            self.role_key(&at, "implied_role", &inference.implied_role);
            if inference.prior_role == inference.implied_role {
                self.problem(&at, "a role cannot imply itself");
            }
        }

        for region in &doc.regions {
            let at = format!("regions[{}]", region.region);
            if region.region.is_empty() {
                self.problem(&at, "region must not be empty");
            }
            if region.parent_region.as_deref() == Some(region.region.as_str()) {
                self.problem(&at, "region cannot be its own parent");
            }
        }
        self.unique(
            "regions",
            "region",
            doc.regions.iter().map(|r| r.region.as_str()),
        );

        for service in &doc.services {
            self.service(service);
        }
        self.unique(
            "services",
            "service",
            doc.services.iter().map(|s| s.name.as_str()),
        );

        for flavor in &doc.flavors {
            let at = format!("flavors[{}]", flavor.name);
            self.name(&at, &flavor.name);
            if flavor.vcpus == 0 {
                self.problem(&at, "vcpus must be greater than 0");
            }
            if flavor.ram == 0 {
                self.problem(&at, "ram must be greater than 0");
            }
            if let Some(factor) = flavor.rxtx_factor
                && factor <= 0.0
            {
                self.problem(&at, "rxtx_factor must be greater than 0");
            }
            self.access(&at, flavor.visibility, flavor.access.as_ref());
        }
        self.unique("flavors", "flavor", doc.flavors.iter().map(|f| f.name.as_str()));

        for share_type in &doc.share_types {
            let at = format!("share_types[{}]", share_type.name);
            self.name(&at, &share_type.name);
            self.access(&at, share_type.visibility, share_type.access.as_ref());
        }
        self.unique(
            "share_types",
            "share type",
            doc.share_types.iter().map(|s| s.name.as_str()),
        );

        for volume_type in &doc.volume_types {
            let at = format!("volume_types[{}]", volume_type.name);
            self.name(&at, &volume_type.name);
            self.access(&at, volume_type.visibility, volume_type.access.as_ref());
        }
        self.unique(
            "volume_types",
            "volume type",
            doc.volume_types.iter().map(|s| s.name.as_str()),
        );

        for (field, names) in [
            ("resource_classes", &doc.resource_classes),
            ("traits", &doc.traits),
        ] {
            for name in names {
                self.custom_name(field, name);
            }
            self.unique(field, "name", names.iter().map(String::as_str));
        }

        for policy in &doc.rbac_policies {
            self.rbac_policy(policy);
        }

        for domain in &doc.domains {
            self.domain(domain);
        }
        self.unique(
            "domains",
            "domain",
            doc.domains.iter().map(|d| d.name.as_str()),
        );

        self.project_parents(doc);
    }

    fn service(&mut self, service: &ServiceSpec) {
        let at = format!("services[{}]", service.name);
        self.name(&at, &service.name);
        if service.service_type.is_empty() {
            self.problem(&at, "type must not be empty");
        }
        let mut seen = BTreeSet::new();
        for endpoint in &service.endpoints {
            let ep_at = format!("{}.endpoints[{}/{}]", at, endpoint.region, endpoint.interface);
            if endpoint.region.is_empty() {
                self.problem(&ep_at, "region must not be empty");
            }
            if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
                self.problem(
                    &ep_at,
                    format!("url '{}' must be an http(s) URL", endpoint.url),
                );
            }
            if !seen.insert((endpoint.region.as_str(), endpoint.interface)) {
                self.problem(&ep_at, "duplicate endpoint for region and interface");
            }
        }
    }

    fn access(&mut self, at: &str, visibility: Visibility, access: Option<&AccessList>) {
        let Some(access) = access else {
            return;
        };
        if visibility.is_public() && !access.projects.is_empty() {
            self.problem(at, "access list requires visibility: private");
        }
        for project in &access.projects {
            self.key(at, "access project", project, PROJECT_SEGMENTS);
        }
    }

    fn custom_name(&mut self, field: &str, name: &str) {
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !name.starts_with("CUSTOM_") || name.len() == "CUSTOM_".len() || !valid_chars {
            self.problem(
                field,
                format!("'{}' must match CUSTOM_[A-Z0-9_]+", name),
            );
        }
    }

    fn rbac_policy(&mut self, policy: &RbacPolicySpec) {
        let at = format!("rbac_policies[{}]", policy.object);
        if policy.object_type != "network" {
            self.problem(
                &at,
                format!("object_type '{}' is not supported", policy.object_type),
            );
        }
        if !RBAC_ACTIONS.contains(&policy.action.as_str()) {
            self.problem(&at, format!("action '{}' is not supported", policy.action));
        }
        self.key(&at, "object", &policy.object, NETWORK_SEGMENTS);
        if policy.target_project != "*" {
            self.key(&at, "target_project", &policy.target_project, PROJECT_SEGMENTS);
        }
    }

    fn domain(&mut self, domain: &DomainSpec) {
        let at = format!("domains[{}]", domain.name);
        self.name(&at, &domain.name);

        for (group, options) in &domain.config {
            if group.trim().is_empty() {
                self.problem(&at, "config group must not be empty");
            }
            if options.keys().any(|o| o.trim().is_empty()) {
                self.problem(&at, format!("config group '{}' has an empty option", group));
            }
        }

        for role in &domain.roles {
            self.name(&format!("{}.roles[{}]", at, role.name), &role.name);
        }
        self.unique(&at, "role", domain.roles.iter().map(|r| r.name.as_str()));

        for (i, assignment) in domain.role_assignments.iter().enumerate() {
            let a_at = format!("{}.role_assignments[{}]", at, i);
            self.assignment(&a_at, assignment, AssignmentSite::Domain);
        }

        for user in &domain.users {
            let u_at = format!("{}.users[{}]", at, user.name);
            self.name(&u_at, &user.name);
            if let Some(project) = &user.default_project {
                self.key(&u_at, "default_project", project, PROJECT_SEGMENTS);
            }
            for (i, assignment) in user.role_assignments.iter().enumerate() {
                let a_at = format!("{}.role_assignments[{}]", u_at, i);
                self.assignment(&a_at, assignment, AssignmentSite::Actor);
            }
        }
        self.unique(&at, "user", domain.users.iter().map(|u| u.name.as_str()));

        for group in &domain.groups {
            let g_at = format!("{}.groups[{}]", at, group.name);
            self.name(&g_at, &group.name);
            for user in &group.users {
                self.key(&g_at, "user", user, PROJECT_SEGMENTS);
            }
            self.unique(&g_at, "member", group.users.iter().map(String::as_str));
            for (i, assignment) in group.role_assignments.iter().enumerate() {
                let a_at = format!("{}.role_assignments[{}]", g_at, i);
                self.assignment(&a_at, assignment, AssignmentSite::Actor);
            }
        }
        self.unique(&at, "group", domain.groups.iter().map(|g| g.name.as_str()));

        for project in &domain.projects {
            self.project(&at, project);
        }
        self.unique(
            &at,
            "project",
            domain.projects.iter().map(|p| p.name.as_str()),
        );
    }

    fn assignment(&mut self, at: &str, assignment: &RoleAssignmentSpec, site: AssignmentSite) {
        self.role_key(at, "role", &assignment.role);

        let actors = usize::from(assignment.user.is_some()) + usize::from(assignment.group.is_some());
        let scopes = assignment.scope_count();
        let (want_actors, want_scopes) = match site {
            AssignmentSite::Domain => (1, 1),
            AssignmentSite::Actor => (0, 1),
            AssignmentSite::Project => (1, 0),
        };
        if actors != want_actors {
            let message = match want_actors {
                0 => "must not name a user or group here",
                _ => "must name exactly one of user or group",
            };
            self.problem(at, message);
        }
        if scopes != want_scopes {
            let message = match want_scopes {
                0 => "must not name a project, domain or system scope here",
                _ => "must name exactly one of project, domain or system",
            };
            self.problem(at, message);
        }

        if let Some(user) = &assignment.user {
            self.key(at, "user", user, PROJECT_SEGMENTS);
        }
        if let Some(group) = &assignment.group {
            self.key(at, "group", group, PROJECT_SEGMENTS);
        }
        if let Some(project) = &assignment.project {
            self.key(at, "project", project, PROJECT_SEGMENTS);
        }
        if let Some(domain) = &assignment.domain {
            self.key(at, "domain", domain, DOMAIN_SEGMENTS);
        }
        if let Some(system) = &assignment.system
            && system != "all"
        {
            self.problem(at, format!("system scope '{}' is not 'all'", system));
        }
        if assignment.inherited && assignment.system.is_some() {
            self.problem(at, "system assignments cannot be inherited");
        }
    }

    fn project(&mut self, domain_at: &str, project: &ProjectSpec) {
        let at = format!("{}.projects[{}]", domain_at, project.name);
        self.name(&at, &project.name);
        if let Some(parent) = &project.parent {
            self.key(&at, "parent", parent, PROJECT_SEGMENTS);
        }
        for (i, assignment) in project.role_assignments.iter().enumerate() {
            let a_at = format!("{}.role_assignments[{}]", at, i);
            self.assignment(&a_at, assignment, AssignmentSite::Project);
        }

        self.quota(&at, "network_quota", &project.network_quota);
        self.quota(&at, "compute_quota", &project.compute_quota);
        self.quota(&at, "volume_quota", &project.volume_quota);
        self.quota(&at, "share_quota", &project.share_quota);
        self.quota(&at, "dns_quota", &project.dns_quota);

        for scope in &project.address_scopes {
            let s_at = format!("{}.address_scopes[{}]", at, scope.name);
            self.name(&s_at, &scope.name);
            self.ip_version(&s_at, scope.ip_version);
        }
        self.unique(
            &at,
            "address scope",
            project.address_scopes.iter().map(|s| s.name.as_str()),
        );

        for pool in &project.subnet_pools {
            let p_at = format!("{}.subnet_pools[{}]", at, pool.name);
            self.name(&p_at, &pool.name);
            if pool.prefixes.is_empty() {
                self.problem(&p_at, "prefixes must not be empty");
            }
            if let Some(scope) = &pool.address_scope {
                self.key(&p_at, "address_scope", scope, NETWORK_SEGMENTS);
            }
            if let (Some(min), Some(max)) = (pool.min_prefixlen, pool.max_prefixlen)
                && min > max
            {
                self.problem(&p_at, "min_prefixlen exceeds max_prefixlen");
            }
        }
        self.unique(
            &at,
            "subnet pool",
            project.subnet_pools.iter().map(|p| p.name.as_str()),
        );

        for network in &project.networks {
            self.network(&at, network);
        }
        self.unique(
            &at,
            "network",
            project.networks.iter().map(|n| n.name.as_str()),
        );

        for router in &project.routers {
            let r_at = format!("{}.routers[{}]", at, router.name);
            self.name(&r_at, &router.name);
            if let Some(gateway) = &router.external_gateway {
                self.key(&r_at, "external_gateway.network", &gateway.network, NETWORK_SEGMENTS);
            }
            for interface in &router.interfaces {
                self.key(&r_at, "interface subnet", &interface.subnet, SUBNET_SEGMENTS);
            }
            self.unique(
                &r_at,
                "interface",
                router.interfaces.iter().map(|i| i.subnet.as_str()),
            );
        }
        self.unique(
            &at,
            "router",
            project.routers.iter().map(|r| r.name.as_str()),
        );

        if let Some(swift) = &project.swift {
            for container in &swift.containers {
                let c_at = format!("{}.swift.containers[{}]", at, container.name);
                if container.name.is_empty() || container.name.contains('/') {
                    self.problem(&c_at, "container name must be non-empty and contain no '/'");
                }
            }
            self.unique(
                &at,
                "container",
                swift.containers.iter().map(|c| c.name.as_str()),
            );
        }

        for zone in &project.dns_zones {
            self.zone(&at, zone);
        }
        self.unique(
            &at,
            "zone",
            project.dns_zones.iter().map(|z| z.name.as_str()),
        );

        let zones: BTreeSet<&str> = project.dns_zones.iter().map(|z| z.name.as_str()).collect();
        for tsigkey in &project.dns_tsigkeys {
            let t_at = format!("{}.dns_tsigkeys[{}]", at, tsigkey.name);
            self.name(&t_at, &tsigkey.name);
            if tsigkey.algorithm.is_empty() {
                self.problem(&t_at, "algorithm must not be empty");
            }
            if tsigkey.secret.is_empty() {
                self.problem(&t_at, "secret must not be empty");
            }
            match tsigkey.scope {
                TsigScope::Pool => {
                    if tsigkey.resource_id.is_none() {
                        self.problem(&t_at, "pool-scoped key needs resource_id");
                    }
                    if tsigkey.zone.is_some() {
                        self.problem(&t_at, "pool-scoped key must not name a zone");
                    }
                }
                TsigScope::Zone => match &tsigkey.zone {
                    None => self.problem(&t_at, "zone-scoped key needs zone"),
                    Some(zone) if !zones.contains(zone.as_str()) => self.problem(
                        &t_at,
                        format!("zone '{}' is not declared in this project", zone),
                    ),
                    Some(_) => {
                        if tsigkey.resource_id.is_some() {
                            self.problem(&t_at, "zone-scoped key takes zone, not resource_id");
                        }
                    }
                },
            }
        }
        self.unique(
            &at,
            "tsigkey",
            project.dns_tsigkeys.iter().map(|t| t.name.as_str()),
        );

        for (field, names) in [
            ("flavors", &project.flavors),
            ("share_types", &project.share_types),
            ("volume_types", &project.volume_types),
        ] {
            for name in names {
                self.name(&format!("{}.{}", at, field), name);
            }
            self.unique(&at, field, names.iter().map(String::as_str));
        }
    }

    fn network(&mut self, project_at: &str, network: &NetworkSpec) {
        let at = format!("{}.networks[{}]", project_at, network.name);
        self.name(&at, &network.name);

        if let Some(provider) = &network.provider
            && provider.segmentation_id.is_some()
            && matches!(provider.network_type, NetworkType::Flat | NetworkType::Local)
        {
            self.problem(
                &at,
                format!(
                    "segmentation_id is not allowed for {} networks",
                    provider.network_type.as_str()
                ),
            );
        }

        for subnet in &network.subnets {
            let s_at = format!("{}.subnets[{}]", at, subnet.name);
            self.name(&s_at, &subnet.name);
            self.ip_version(&s_at, subnet.ip_version);
            if subnet.cidr.is_none() && subnet.subnet_pool.is_none() {
                self.problem(&s_at, "subnet needs a cidr or a subnet_pool");
            }
            if let Some(cidr) = &subnet.cidr
                && !cidr.contains('/')
            {
                self.problem(&s_at, format!("cidr '{}' has no prefix length", cidr));
            }
            if let Some(pool) = &subnet.subnet_pool {
                self.key(&s_at, "subnet_pool", pool, NETWORK_SEGMENTS);
            }
        }
        self.unique(&at, "subnet", network.subnets.iter().map(|s| s.name.as_str()));

        for port in &network.ports {
            let p_at = format!("{}.ports[{}]", at, port.name);
            self.name(&p_at, &port.name);
            for fixed_ip in &port.fixed_ips {
                self.key(&p_at, "fixed_ips.subnet", &fixed_ip.subnet, SUBNET_SEGMENTS);
            }
        }
        self.unique(&at, "port", network.ports.iter().map(|p| p.name.as_str()));
    }

    fn zone(&mut self, project_at: &str, zone: &ZoneSpec) {
        let at = format!("{}.dns_zones[{}]", project_at, zone.name);
        if zone.name == "." || zone.name.contains(key::SEPARATOR) {
            self.problem(&at, "zone name must be a domain name");
        }
        if !zone.email.contains('@') {
            self.problem(&at, format!("email '{}' is not an address", zone.email));
        }
        if let Some(zone_type) = &zone.zone_type
            && !ZONE_TYPES.contains(&zone_type.as_str())
        {
            self.problem(&at, format!("zone type '{}' is not supported", zone_type));
        }

        let mut seen = BTreeSet::new();
        for recordset in &zone.recordsets {
            let r_at = format!("{}.recordsets[{}/{}]", at, recordset.name, recordset.record_type);
            if recordset.record_type.is_empty() {
                self.problem(&r_at, "type must not be empty");
            }
            if recordset.records.is_empty() {
                self.problem(&r_at, "records must not be empty");
            }
            if !recordset.name.ends_with(&zone.name) {
                self.problem(&r_at, "recordset name lies outside the zone");
            }
            if !seen.insert((recordset.name.as_str(), recordset.record_type.as_str())) {
                self.problem(&r_at, "duplicate recordset");
            }
        }
    }

    /// Parents must exist as keys and must not form a cycle
    fn project_parents(&mut self, doc: &SpecDocument) {
        let parents: BTreeMap<String, &str> = doc
            .domains
            .iter()
            .flat_map(|d| {
                d.projects.iter().filter_map(move |p| {
                    p.parent
                        .as_deref()
                        .map(|parent| (key::join(&[p.name.as_str(), d.name.as_str()]), parent))
                })
            })
            .collect();

        let mut reported = BTreeSet::new();
        for start in parents.keys() {
            let mut seen = BTreeSet::new();
            let mut current = start.as_str();
            seen.insert(current);
            while let Some(&parent) = parents.get(current) {
                if !seen.insert(parent) {
                    if reported.insert(start.clone()) {
                        self.problem(
                            &format!("projects[{}]", start),
                            "parent chain forms a cycle",
                        );
                    }
                    break;
                }
                current = parent;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AssignmentSite {
    /// Domain-level list: actor and scope both named
    Domain,
    /// Under a user or group: scope named, actor implied
    Actor,
    /// Under a project: actor named, scope implied
    Project,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, parent: Option<&str>) -> ProjectSpec {
        ProjectSpec {
            name: name.into(),
            parent: parent.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_empty_document() {
        assert!(validate(&SpecDocument::default()).is_empty());
    }

    #[test]
    fn test_detects_parent_cycle() {
        let doc = SpecDocument {
            domains: vec![DomainSpec {
                name: "acme".into(),
                projects: vec![
                    project("a", Some("b@acme")),
                    project("b", Some("a@acme")),
                    project("c", Some("a@acme")),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems = validate(&doc);
        assert_eq!(
            problems
                .iter()
                .filter(|p| p.contains("cycle"))
                .count(),
            3
        );
    }

    #[test]
    fn test_assignment_rules_per_site() {
        let doc = SpecDocument {
            domains: vec![DomainSpec {
                name: "acme".into(),
                role_assignments: vec![RoleAssignmentSpec {
                    role: "admin".into(),
                    project: Some("ops@acme".into()),
                    ..Default::default()
                }],
                projects: vec![ProjectSpec {
                    name: "ops".into(),
                    role_assignments: vec![RoleAssignmentSpec {
                        user: Some("alice@acme".into()),
                        role: "admin".into(),
                        domain: Some("acme".into()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems = validate(&doc);
        assert!(problems.iter().any(|p| p.contains("role_assignments[0]")
            && p.contains("exactly one of user or group")));
        assert!(
            problems
                .iter()
                .any(|p| p.contains("projects[ops]") && p.contains("must not name a project"))
        );
    }

    #[test]
    fn test_collects_every_problem() {
        let doc = SpecDocument {
            flavors: vec![FlavorSpec {
                name: "tiny".into(),
                vcpus: 0,
                ram: 0,
                disk: 1,
                ..Default::default()
            }],
            resource_classes: vec!["GPU".into()],
            ..Default::default()
        };
        let problems = validate(&doc);
        assert_eq!(problems.len(), 3, "{:?}", problems);
    }

    #[test]
    fn test_tsigkey_zone_must_be_declared() {
        let doc = SpecDocument {
            domains: vec![DomainSpec {
                name: "acme".into(),
                projects: vec![ProjectSpec {
                    name: "ops".into(),
                    dns_tsigkeys: vec![TsigKeySpec {
                        name: "xfer".into(),
                        algorithm: "hmac-sha256".into(),
                        secret: "c2VjcmV0".into(),
                        scope: TsigScope::Zone,
                        zone: Some("example.com.".into()),
                        resource_id: None,
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems = validate(&doc);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("not declared"));
    }

    #[test]
    fn test_subnet_requires_cidr_or_pool() {
        let doc = SpecDocument {
            domains: vec![DomainSpec {
                name: "acme".into(),
                projects: vec![ProjectSpec {
                    name: "ops".into(),
                    networks: vec![NetworkSpec {
                        name: "net".into(),
                        subnets: vec![SubnetSpec {
                            name: "sub".into(),
                            ip_version: 5,
                            ..Default::default()
                        }],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems = validate(&doc);
        assert_eq!(problems.len(), 2, "{:?}", problems);
    }

    #[test]
    fn test_duplicate_endpoint_per_region_and_interface() {
        let endpoint = |region: &str, interface: Interface| EndpointSpec {
            region: region.into(),
            interface,
            url: "https://nova.example.com/v2.1".into(),
            ..Default::default()
        };
        let doc = SpecDocument {
            services: vec![ServiceSpec {
                name: "nova".into(),
                service_type: "compute".into(),
                endpoints: vec![
                    endpoint("r1", Interface::Public),
                    endpoint("r1", Interface::Internal),
                    endpoint("r2", Interface::Public),
                    endpoint("r1", Interface::Public),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems: Vec<_> = validate(&doc)
            .into_iter()
            .filter(|p| p.contains("duplicate endpoint"))
            .collect();
        assert_eq!(problems.len(), 1, "{:?}", problems);
        assert!(problems[0].contains("endpoints[r1/public]"));
    }
}
