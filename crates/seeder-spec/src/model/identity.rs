//! Identity records: domains, projects, users, groups, roles, assignments

use super::de::is_false;
use super::dns::{TsigKeySpec, ZoneSpec};
use super::network::{AddressScopeSpec, NetworkSpec, RouterSpec, SubnetPoolSpec};
use super::storage::SwiftSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Domain definition
///
/// ```yaml
/// domains:
///   - name: acme
///     description: ACME Corp
///     config:
///       identity: {driver: ldap}
///     projects: [...]
///     users: [...]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Domain-specific configuration, `group -> option -> value`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, BTreeMap<String, Value>>,

    /// Domain-scoped roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_assignments: Vec<RoleAssignmentSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Parent project key (`<project>@<domain>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Assignments scoped to this project; each names a user or a group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_assignments: Vec<RoleAssignmentSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub network_quota: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub compute_quota: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volume_quota: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub share_quota: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dns_quota: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address_scopes: Vec<AddressScopeSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_pools: Vec<SubnetPoolSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routers: Vec<RouterSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift: Option<SwiftSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_zones: Vec<ZoneSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_tsigkeys: Vec<TsigKeySpec>,

    /// Flavors this project is granted access to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flavors: Vec<String>,

    /// Share types this project is granted access to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub share_types: Vec<String>,

    /// Volume types this project is granted access to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Initial password, sent on create only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Default project key (`<project>@<domain>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,

    /// Assignments of this user; no `user`/`group` key allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_assignments: Vec<RoleAssignmentSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Member user keys (`<user>@<domain>`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,

    /// Remove members not listed in `users`
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_assignments: Vec<RoleAssignmentSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `prior_role` implies `implied_role`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleInferenceSpec {
    pub prior_role: String,
    pub implied_role: String,
}

/// Role assignment as written in the spec
///
/// Where the actor or the scope is implied by the enclosing record (a user,
/// a group, a project) the corresponding keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleAssignmentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// System scope target; only `all` exists today
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Inherited to the projects below the scope
    #[serde(default, skip_serializing_if = "is_false")]
    pub inherited: bool,
}

/// Kind of the target an assignment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Domain,
    Project,
    System,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Domain => write!(f, "domain"),
            ScopeKind::Project => write!(f, "project"),
            ScopeKind::System => write!(f, "system"),
        }
    }
}

/// Canonical assignment target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub kind: ScopeKind,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorKind {
    User,
    Group,
}

impl std::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorKind::User => write!(f, "user"),
            ActorKind::Group => write!(f, "group"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Actor {
    pub kind: ActorKind,
    pub key: String,
}

impl RoleAssignmentSpec {
    /// The single scope named by the assignment, if exactly one is named
    pub fn scope(&self) -> Option<Scope> {
        let named = [
            self.project.as_ref().map(|k| (ScopeKind::Project, k)),
            self.domain.as_ref().map(|k| (ScopeKind::Domain, k)),
            self.system.as_ref().map(|k| (ScopeKind::System, k)),
        ];
        let mut found = named.into_iter().flatten();
        let (kind, key) = found.next()?;
        if found.next().is_some() {
            return None;
        }
        Some(Scope {
            kind,
            key: key.clone(),
        })
    }

    /// The single actor named by the assignment, if exactly one is named
    pub fn actor(&self) -> Option<Actor> {
        match (&self.user, &self.group) {
            (Some(user), None) => Some(Actor {
                kind: ActorKind::User,
                key: user.clone(),
            }),
            (None, Some(group)) => Some(Actor {
                kind: ActorKind::Group,
                key: group.clone(),
            }),
            _ => None,
        }
    }

    pub fn scope_count(&self) -> usize {
        [
            self.project.is_some(),
            self.domain.is_some(),
            self.system.is_some(),
        ]
        .iter()
        .filter(|named| **named)
        .count()
    }
}
