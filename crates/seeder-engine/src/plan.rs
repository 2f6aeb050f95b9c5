//! Dependency plan
//!
//! Flattens a spec document into one task per reconciler invocation and
//! wires the must-complete-before edges between them. Tasks are numbered in
//! spec order; the scheduler breaks ties by that number.

use crate::error::{EngineError, Result};
use seeder_cloud::ResourceKind;
use seeder_spec::key;
use seeder_spec::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Actor, role, scope and inheritance flag of one role assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub actor: Actor,
    pub role: String,
    pub scope: Scope,
    pub inherited: bool,
}

impl Assignment {
    fn key(&self) -> String {
        let actor = match self.actor.kind {
            ActorKind::User => "user",
            ActorKind::Group => "group",
        };
        let mut key = format!(
            "{}={} role={} {}={}",
            actor, self.actor.key, self.role, self.scope.kind, self.scope.key
        );
        if self.inherited {
            key.push_str(" inherited");
        }
        key
    }
}

/// Work of one task, with the spec data it needs
#[derive(Debug, Clone)]
pub enum Op {
    Domain {
        name: String,
        description: Option<String>,
        enabled: Option<bool>,
    },
    DomainConfig {
        domain: String,
        config: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    },
    Role {
        role: RoleSpec,
        domain: Option<String>,
    },
    RoleInference(RoleInferenceSpec),
    Project {
        domain: String,
        name: String,
        description: Option<String>,
        enabled: Option<bool>,
        parent: Option<String>,
        tags: Vec<String>,
    },
    User {
        domain: String,
        user: UserSpec,
    },
    Group {
        domain: String,
        group: GroupSpec,
    },
    GroupMembership {
        group: String,
        users: Vec<String>,
        exclusive: bool,
    },
    RoleAssignment(Assignment),
    Region(RegionSpec),
    Service(ServiceSpec),
    Endpoint {
        service: String,
        endpoint: EndpointSpec,
    },
    Quota {
        project: String,
        values: BTreeMap<String, i64>,
    },
    AddressScope {
        project: String,
        scope: AddressScopeSpec,
    },
    SubnetPool {
        project: String,
        pool: SubnetPoolSpec,
    },
    Network {
        project: String,
        network: NetworkSpec,
    },
    Subnet {
        project: String,
        network: String,
        subnet: SubnetSpec,
    },
    Port {
        project: String,
        network: String,
        port: PortSpec,
    },
    Router {
        project: String,
        router: RouterSpec,
    },
    RbacPolicy(RbacPolicySpec),
    SwiftAccount {
        project: String,
    },
    SwiftContainer {
        project: String,
        container: ContainerSpec,
    },
    Zone {
        project: String,
        zone: ZoneSpec,
    },
    Recordset {
        project: String,
        zone: String,
        recordset: RecordsetSpec,
    },
    TsigKey {
        project: String,
        tsigkey: TsigKeySpec,
    },
    Flavor(FlavorSpec),
    ShareType(ShareTypeSpec),
    VolumeType(VolumeTypeSpec),
    /// Project access to a private flavor, share type or volume type
    Access {
        resource: String,
        projects: Vec<String>,
        exclusive: bool,
    },
    Placement {
        name: String,
    },
}

#[derive(Debug, Clone)]
pub struct Task {
    pub kind: ResourceKind,
    pub key: String,
    pub op: Op,
    /// Indices of tasks that must complete first
    pub deps: Vec<usize>,
}

impl Task {
    /// Report key: kind and symbolic key
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.key)
    }
}

#[derive(Debug, Default)]
pub struct Plan {
    pub tasks: Vec<Task>,
}

impl Plan {
    /// Build the plan of `doc`; fails only on a dependency cycle
    pub fn build(doc: &SpecDocument) -> Result<Self> {
        let mut builder = Builder::default();
        builder.collect(doc);
        builder.link();
        let plan = Plan {
            tasks: builder.tasks,
        };
        plan.check_acyclic()?;
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find(&self, kind: ResourceKind, key: &str) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.kind == kind && t.key == key)
    }

    /// Reverse edges: for each task, the tasks waiting on it
    pub fn dependents(&self) -> Vec<Vec<usize>> {
        let mut dependents = vec![Vec::new(); self.tasks.len()];
        for (index, task) in self.tasks.iter().enumerate() {
            for dep in &task.deps {
                dependents[*dep].push(index);
            }
        }
        dependents
    }

    /// Kahn's algorithm; the tasks left over sit on a cycle
    fn check_acyclic(&self) -> Result<()> {
        let dependents = self.dependents();
        let mut indegree: Vec<usize> = self.tasks.iter().map(|t| t.deps.len()).collect();
        let mut ready: VecDeque<usize> = (0..self.tasks.len())
            .filter(|i| indegree[*i] == 0)
            .collect();
        let mut seen = 0;
        while let Some(index) = ready.pop_front() {
            seen += 1;
            for next in &dependents[index] {
                indegree[*next] -= 1;
                if indegree[*next] == 0 {
                    ready.push_back(*next);
                }
            }
        }
        if seen == self.tasks.len() {
            return Ok(());
        }
        let stuck = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d > 0)
            .map(|(i, _)| self.tasks[i].label())
            .collect();
        Err(EngineError::Cycle(stuck))
    }
}

#[derive(Default)]
struct Builder {
    tasks: Vec<Task>,
    index: HashMap<(ResourceKind, String), usize>,
    /// Desired access per (access kind, resource name), in spec order
    access: BTreeMap<(ResourceKind, String), (Vec<String>, bool)>,
}

impl Builder {
    fn push(&mut self, kind: ResourceKind, key: impl Into<String>, op: Op) {
        let key = key.into();
        if self.index.contains_key(&(kind, key.clone())) {
            return;
        }
        self.index.insert((kind, key.clone()), self.tasks.len());
        self.tasks.push(Task {
            kind,
            key,
            op,
            deps: Vec::new(),
        });
    }

    fn grant(&mut self, kind: ResourceKind, resource: &str, project: &str) {
        let (projects, _) = self
            .access
            .entry((kind, resource.to_string()))
            .or_default();
        if !projects.iter().any(|p| p == project) {
            projects.push(project.to_string());
        }
    }

    fn access_list(&mut self, kind: ResourceKind, resource: &str, list: Option<&AccessList>) {
        let Some(list) = list else {
            return;
        };
        for project in &list.projects {
            self.grant(kind, resource, project);
        }
        let entry = self.access.entry((kind, resource.to_string())).or_default();
        entry.1 = list.exclusive;
    }

    /// One task per object, in spec order
    fn collect(&mut self, doc: &SpecDocument) {
        use ResourceKind as K;

        for region in &doc.regions {
            self.push(K::Region, &region.region, Op::Region(region.clone()));
        }
        for service in &doc.services {
            self.push(K::Service, &service.name, Op::Service(service.clone()));
            for endpoint in &service.endpoints {
                let key = format!("{}/{}/{}", service.name, endpoint.region, endpoint.interface);
                self.push(
                    K::Endpoint,
                    key,
                    Op::Endpoint {
                        service: service.name.clone(),
                        endpoint: endpoint.clone(),
                    },
                );
            }
        }
        for role in &doc.roles {
            self.push(
                K::Role,
                &role.name,
                Op::Role {
                    role: role.clone(),
                    domain: None,
                },
            );
        }
        for name in &doc.resource_classes {
            self.push(K::ResourceClass, name, Op::Placement { name: name.clone() });
        }
        for name in &doc.traits {
            self.push(K::Trait, name, Op::Placement { name: name.clone() });
        }
        for flavor in &doc.flavors {
            self.push(K::Flavor, &flavor.name, Op::Flavor(flavor.clone()));
            self.access_list(K::FlavorAccess, &flavor.name, flavor.access.as_ref());
        }
        for share_type in &doc.share_types {
            self.push(K::ShareType, &share_type.name, Op::ShareType(share_type.clone()));
            self.access_list(K::ShareTypeAccess, &share_type.name, share_type.access.as_ref());
        }
        for volume_type in &doc.volume_types {
            self.push(K::VolumeType, &volume_type.name, Op::VolumeType(volume_type.clone()));
            self.access_list(
                K::VolumeTypeAccess,
                &volume_type.name,
                volume_type.access.as_ref(),
            );
        }

        for domain in &doc.domains {
            self.collect_domain(domain);
        }

        for inference in &doc.role_inferences {
            let key = format!("{}->{}", inference.prior_role, inference.implied_role);
            self.push(K::RoleInference, key, Op::RoleInference(inference.clone()));
        }
        for policy in &doc.rbac_policies {
            let key = format!("{}/{}/{}", policy.object, policy.action, policy.target_project);
            self.push(K::RbacPolicy, key, Op::RbacPolicy(policy.clone()));
        }

        let access = std::mem::take(&mut self.access);
        for ((kind, resource), (projects, exclusive)) in access {
            self.push(
                kind,
                resource.clone(),
                Op::Access {
                    resource,
                    projects,
                    exclusive,
                },
            );
        }
    }

    fn collect_domain(&mut self, domain: &DomainSpec) {
        use ResourceKind as K;
        let dom = domain.name.as_str();

        self.push(
            K::Domain,
            dom,
            Op::Domain {
                name: domain.name.clone(),
                description: domain.description.clone(),
                enabled: domain.enabled,
            },
        );
        if !domain.config.is_empty() {
            self.push(
                K::DomainConfig,
                dom,
                Op::DomainConfig {
                    domain: dom.to_string(),
                    config: domain.config.clone(),
                },
            );
        }
        for role in &domain.roles {
            self.push(
                K::Role,
                key::join(&[role.name.as_str(), dom]),
                Op::Role {
                    role: role.clone(),
                    domain: Some(dom.to_string()),
                },
            );
        }
        for project in &domain.projects {
            self.collect_project(dom, project);
        }
        for user in &domain.users {
            self.push(
                K::User,
                key::join(&[user.name.as_str(), dom]),
                Op::User {
                    domain: dom.to_string(),
                    user: user.clone(),
                },
            );
        }
        for group in &domain.groups {
            let group_key = key::join(&[group.name.as_str(), dom]);
            self.push(
                K::Group,
                group_key.clone(),
                Op::Group {
                    domain: dom.to_string(),
                    group: group.clone(),
                },
            );
            if !group.users.is_empty() || group.exclusive {
                self.push(
                    K::GroupMembership,
                    group_key.clone(),
                    Op::GroupMembership {
                        group: group_key,
                        users: group.users.clone(),
                        exclusive: group.exclusive,
                    },
                );
            }
        }

        // assignments last so that their actors and scopes precede them in
        // spec order as well
        for assignment in &domain.role_assignments {
            self.assignment(assignment, None, None);
        }
        for user in &domain.users {
            let actor = Actor {
                kind: ActorKind::User,
                key: key::join(&[user.name.as_str(), dom]),
            };
            for assignment in &user.role_assignments {
                self.assignment(assignment, Some(&actor), None);
            }
        }
        for group in &domain.groups {
            let actor = Actor {
                kind: ActorKind::Group,
                key: key::join(&[group.name.as_str(), dom]),
            };
            for assignment in &group.role_assignments {
                self.assignment(assignment, Some(&actor), None);
            }
        }
        for project in &domain.projects {
            let scope = Scope {
                kind: ScopeKind::Project,
                key: key::join(&[project.name.as_str(), dom]),
            };
            for assignment in &project.role_assignments {
                self.assignment(assignment, None, Some(&scope));
            }
        }
    }

    /// Complete an assignment with the actor or scope implied by where it is
    /// declared
    fn assignment(
        &mut self,
        spec: &RoleAssignmentSpec,
        actor: Option<&Actor>,
        scope: Option<&Scope>,
    ) {
        let (Some(actor), Some(scope)) = (
            spec.actor().or_else(|| actor.cloned()),
            spec.scope().or_else(|| scope.cloned()),
        ) else {
            return;
        };
        let assignment = Assignment {
            actor,
            role: spec.role.clone(),
            scope,
            inherited: spec.inherited,
        };
        self.push(
            ResourceKind::RoleAssignment,
            assignment.key(),
            Op::RoleAssignment(assignment),
        );
    }

    fn collect_project(&mut self, dom: &str, project: &ProjectSpec) {
        use ResourceKind as K;
        let project_key = key::join(&[project.name.as_str(), dom]);
        let within = |name: &str| key::join(&[name, project_key.as_str()]);

        self.push(
            K::Project,
            project_key.clone(),
            Op::Project {
                domain: dom.to_string(),
                name: project.name.clone(),
                description: project.description.clone(),
                enabled: project.enabled,
                parent: project.parent.clone(),
                tags: project.tags.clone(),
            },
        );

        for (kind, values) in [
            (K::NetworkQuota, &project.network_quota),
            (K::ComputeQuota, &project.compute_quota),
            (K::VolumeQuota, &project.volume_quota),
            (K::ShareQuota, &project.share_quota),
            (K::DnsQuota, &project.dns_quota),
        ] {
            if !values.is_empty() {
                self.push(
                    kind,
                    project_key.clone(),
                    Op::Quota {
                        project: project_key.clone(),
                        values: values.clone(),
                    },
                );
            }
        }

        for scope in &project.address_scopes {
            self.push(
                K::AddressScope,
                within(&scope.name),
                Op::AddressScope {
                    project: project_key.clone(),
                    scope: scope.clone(),
                },
            );
        }
        for pool in &project.subnet_pools {
            self.push(
                K::SubnetPool,
                within(&pool.name),
                Op::SubnetPool {
                    project: project_key.clone(),
                    pool: pool.clone(),
                },
            );
        }
        for network in &project.networks {
            let network_key = within(&network.name);
            self.push(
                K::Network,
                network_key.clone(),
                Op::Network {
                    project: project_key.clone(),
                    network: network.clone(),
                },
            );
            for subnet in &network.subnets {
                self.push(
                    K::Subnet,
                    key::join(&[subnet.name.as_str(), network_key.as_str()]),
                    Op::Subnet {
                        project: project_key.clone(),
                        network: network_key.clone(),
                        subnet: subnet.clone(),
                    },
                );
            }
            for port in &network.ports {
                self.push(
                    K::Port,
                    key::join(&[port.name.as_str(), network_key.as_str()]),
                    Op::Port {
                        project: project_key.clone(),
                        network: network_key.clone(),
                        port: port.clone(),
                    },
                );
            }
        }
        for router in &project.routers {
            self.push(
                K::Router,
                within(&router.name),
                Op::Router {
                    project: project_key.clone(),
                    router: router.clone(),
                },
            );
        }
        if let Some(swift) = project.swift.as_ref().filter(|s| s.enabled != Some(false)) {
            self.push(
                K::SwiftAccount,
                project_key.clone(),
                Op::SwiftAccount {
                    project: project_key.clone(),
                },
            );
            for container in &swift.containers {
                self.push(
                    K::SwiftContainer,
                    within(&container.name),
                    Op::SwiftContainer {
                        project: project_key.clone(),
                        container: container.clone(),
                    },
                );
            }
        }
        for zone in &project.dns_zones {
            let zone_key = within(&zone.name);
            self.push(
                K::Zone,
                zone_key.clone(),
                Op::Zone {
                    project: project_key.clone(),
                    zone: zone.clone(),
                },
            );
            for recordset in &zone.recordsets {
                self.push(
                    K::Recordset,
                    format!("{}/{}@{}", recordset.name, recordset.record_type, zone_key),
                    Op::Recordset {
                        project: project_key.clone(),
                        zone: zone_key.clone(),
                        recordset: recordset.clone(),
                    },
                );
            }
        }
        for tsigkey in &project.dns_tsigkeys {
            self.push(
                K::TsigKey,
                within(&tsigkey.name),
                Op::TsigKey {
                    project: project_key.clone(),
                    tsigkey: tsigkey.clone(),
                },
            );
        }

        for flavor in &project.flavors {
            self.grant(K::FlavorAccess, flavor, &project_key);
        }
        for share_type in &project.share_types {
            self.grant(K::ShareTypeAccess, share_type, &project_key);
        }
        for volume_type in &project.volume_types {
            self.grant(K::VolumeTypeAccess, volume_type, &project_key);
        }
    }

    /// Add an edge to the task declaring (`kind`, `key`), if the spec
    /// declares it; undeclared references are resolved against the cloud
    fn dep(&self, deps: &mut BTreeSet<usize>, kind: ResourceKind, key: &str) {
        if let Some(index) = self.index.get(&(kind, key.to_string())) {
            deps.insert(*index);
        }
    }

    fn link(&mut self) {
        use ResourceKind as K;

        let mut all = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let mut deps = BTreeSet::new();

            match &task.op {
                Op::Domain { .. }
                | Op::Service(_)
                | Op::Flavor(_)
                | Op::ShareType(_)
                | Op::VolumeType(_)
                | Op::Placement { .. } => {}
                Op::DomainConfig { domain, .. } => self.dep(&mut deps, K::Domain, domain),
                Op::Role { domain, .. } => {
                    if let Some(domain) = domain {
                        self.dep(&mut deps, K::Domain, domain);
                    }
                }
                Op::RoleInference(inference) => {
                    self.dep(&mut deps, K::Role, &inference.prior_role);
                    self.dep(&mut deps, K::Role, &inference.implied_role);
                }
                Op::Region(region) => {
                    if let Some(parent) = &region.parent_region {
                        self.dep(&mut deps, K::Region, parent);
                    }
                }
                Op::Endpoint { service, endpoint } => {
                    self.dep(&mut deps, K::Service, service);
                    self.dep(&mut deps, K::Region, &endpoint.region);
                }
                Op::Project { domain, parent, .. } => {
                    self.dep(&mut deps, K::Domain, domain);
                    if let Some(parent) = parent {
                        self.dep(&mut deps, K::Project, parent);
                    }
                }
                Op::User { domain, user } => {
                    self.dep(&mut deps, K::Domain, domain);
                    if let Some(project) = &user.default_project {
                        self.dep(&mut deps, K::Project, project);
                    }
                }
                Op::Group { domain, .. } => self.dep(&mut deps, K::Domain, domain),
                Op::GroupMembership { group, users, .. } => {
                    self.dep(&mut deps, K::Group, group);
                    for user in users {
                        self.dep(&mut deps, K::User, user);
                    }
                }
                Op::RoleAssignment(assignment) => {
                    self.dep(&mut deps, K::Role, &assignment.role);
                    match assignment.actor.kind {
                        ActorKind::User => self.dep(&mut deps, K::User, &assignment.actor.key),
                        ActorKind::Group => {
                            self.dep(&mut deps, K::Group, &assignment.actor.key);
                            self.dep(&mut deps, K::GroupMembership, &assignment.actor.key);
                        }
                    }
                    match assignment.scope.kind {
                        ScopeKind::Project => {
                            self.dep(&mut deps, K::Project, &assignment.scope.key)
                        }
                        ScopeKind::Domain => self.dep(&mut deps, K::Domain, &assignment.scope.key),
                        ScopeKind::System => {}
                    }
                }
                Op::Quota { project, .. }
                | Op::AddressScope { project, .. }
                | Op::Network { project, .. }
                | Op::SwiftAccount { project }
                | Op::Zone { project, .. } => self.dep(&mut deps, K::Project, project),
                Op::SubnetPool { project, pool } => {
                    self.dep(&mut deps, K::Project, project);
                    if let Some(scope) = &pool.address_scope {
                        self.dep(&mut deps, K::AddressScope, scope);
                    }
                }
                Op::Subnet { network, subnet, .. } => {
                    self.dep(&mut deps, K::Network, network);
                    if let Some(pool) = &subnet.subnet_pool {
                        self.dep(&mut deps, K::SubnetPool, pool);
                    }
                }
                Op::Port { network, port, .. } => {
                    self.dep(&mut deps, K::Network, network);
                    for fixed_ip in &port.fixed_ips {
                        self.dep(&mut deps, K::Subnet, &fixed_ip.subnet);
                    }
                }
                Op::Router { project, router } => {
                    self.dep(&mut deps, K::Project, project);
                    if let Some(gateway) = &router.external_gateway {
                        self.dep(&mut deps, K::Network, &gateway.network);
                    }
                    for interface in &router.interfaces {
                        self.dep(&mut deps, K::Subnet, &interface.subnet);
                    }
                }
                Op::RbacPolicy(policy) => {
                    self.dep(&mut deps, K::Network, &policy.object);
                    self.dep(&mut deps, K::Project, &policy.target_project);
                }
                Op::SwiftContainer { project, .. } => {
                    self.dep(&mut deps, K::SwiftAccount, project);
                    self.dep(&mut deps, K::Project, project);
                }
                Op::Recordset { zone, .. } => self.dep(&mut deps, K::Zone, zone),
                Op::TsigKey { project, tsigkey } => {
                    self.dep(&mut deps, K::Project, project);
                    if let Some(zone) = &tsigkey.zone {
                        self.dep(&mut deps, K::Zone, &key::join(&[zone.as_str(), project.as_str()]));
                    }
                }
                Op::Access { resource, projects, .. } => {
                    let resource_kind = match task.kind {
                        K::FlavorAccess => K::Flavor,
                        K::ShareTypeAccess => K::ShareType,
                        _ => K::VolumeType,
                    };
                    self.dep(&mut deps, resource_kind, resource);
                    for project in projects {
                        self.dep(&mut deps, K::Project, project);
                    }
                }
            }
            all.push(deps.into_iter().collect());
        }

        for (task, deps) in self.tasks.iter_mut().zip(all) {
            task.deps = deps;
        }
    }
}
