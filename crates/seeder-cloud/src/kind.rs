//! Catalogue of OpenStack services and the object kinds they own

use crate::provider::Filter;
use serde::{Deserialize, Serialize};

/// OpenStack service backing a set of kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    Identity,
    Compute,
    Network,
    Dns,
    ObjectStore,
    BlockStorage,
    SharedFilesystem,
    Placement,
}

impl ServiceType {
    pub const ALL: [ServiceType; 8] = [
        ServiceType::Identity,
        ServiceType::Compute,
        ServiceType::Network,
        ServiceType::Dns,
        ServiceType::ObjectStore,
        ServiceType::BlockStorage,
        ServiceType::SharedFilesystem,
        ServiceType::Placement,
    ];

    /// Service types accepted in the token catalog, most specific first
    pub fn catalog_types(&self) -> &'static [&'static str] {
        match self {
            ServiceType::Identity => &["identity"],
            ServiceType::Compute => &["compute"],
            ServiceType::Network => &["network"],
            ServiceType::Dns => &["dns"],
            ServiceType::ObjectStore => &["object-store"],
            ServiceType::BlockStorage => &["block-storage", "volumev3"],
            ServiceType::SharedFilesystem => &["shared-file-system", "sharev2"],
            ServiceType::Placement => &["placement"],
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.catalog_types()[0])
    }
}

/// Every object class the engine knows how to reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Domain,
    DomainConfig,
    Project,
    User,
    Group,
    GroupMembership,
    Role,
    RoleInference,
    RoleAssignment,
    Region,
    Service,
    Endpoint,
    NetworkQuota,
    ComputeQuota,
    VolumeQuota,
    ShareQuota,
    DnsQuota,
    AddressScope,
    SubnetPool,
    Network,
    Subnet,
    Router,
    RouterInterface,
    Port,
    RbacPolicy,
    SwiftAccount,
    SwiftContainer,
    Zone,
    Recordset,
    TsigKey,
    Flavor,
    FlavorAccess,
    ShareType,
    ShareTypeAccess,
    VolumeType,
    VolumeTypeAccess,
    ResourceClass,
    Trait,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Domain => "domain",
            ResourceKind::DomainConfig => "domain-config",
            ResourceKind::Project => "project",
            ResourceKind::User => "user",
            ResourceKind::Group => "group",
            ResourceKind::GroupMembership => "group-membership",
            ResourceKind::Role => "role",
            ResourceKind::RoleInference => "role-inference",
            ResourceKind::RoleAssignment => "role-assignment",
            ResourceKind::Region => "region",
            ResourceKind::Service => "service",
            ResourceKind::Endpoint => "endpoint",
            ResourceKind::NetworkQuota => "network-quota",
            ResourceKind::ComputeQuota => "compute-quota",
            ResourceKind::VolumeQuota => "volume-quota",
            ResourceKind::ShareQuota => "share-quota",
            ResourceKind::DnsQuota => "dns-quota",
            ResourceKind::AddressScope => "address-scope",
            ResourceKind::SubnetPool => "subnet-pool",
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Router => "router",
            ResourceKind::RouterInterface => "router-interface",
            ResourceKind::Port => "port",
            ResourceKind::RbacPolicy => "rbac-policy",
            ResourceKind::SwiftAccount => "swift-account",
            ResourceKind::SwiftContainer => "swift-container",
            ResourceKind::Zone => "zone",
            ResourceKind::Recordset => "recordset",
            ResourceKind::TsigKey => "tsigkey",
            ResourceKind::Flavor => "flavor",
            ResourceKind::FlavorAccess => "flavor-access",
            ResourceKind::ShareType => "share-type",
            ResourceKind::ShareTypeAccess => "share-type-access",
            ResourceKind::VolumeType => "volume-type",
            ResourceKind::VolumeTypeAccess => "volume-type-access",
            ResourceKind::ResourceClass => "resource-class",
            ResourceKind::Trait => "trait",
        }
    }

    pub fn service(&self) -> ServiceType {
        use ResourceKind::*;
        match self {
            Domain | DomainConfig | Project | User | Group | GroupMembership | Role
            | RoleInference | RoleAssignment | Region | Service | Endpoint => ServiceType::Identity,
            ComputeQuota | Flavor | FlavorAccess => ServiceType::Compute,
            NetworkQuota | AddressScope | SubnetPool | Network | Subnet | Router
            | RouterInterface | Port | RbacPolicy => ServiceType::Network,
            DnsQuota | Zone | Recordset | TsigKey => ServiceType::Dns,
            SwiftAccount | SwiftContainer => ServiceType::ObjectStore,
            VolumeQuota | VolumeType | VolumeTypeAccess => ServiceType::BlockStorage,
            ShareQuota | ShareType | ShareTypeAccess => ServiceType::SharedFilesystem,
            ResourceClass | Trait => ServiceType::Placement,
        }
    }

    /// Quota sets are written concurrently by other tooling; 409 on them is
    /// a race rather than a permanent conflict.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            ResourceKind::NetworkQuota
                | ResourceKind::ComputeQuota
                | ResourceKind::VolumeQuota
                | ResourceKind::ShareQuota
                | ResourceKind::DnsQuota
        )
    }

    /// Fields that identify an object of this kind within its scope
    pub fn unique_fields(&self) -> &'static [&'static str] {
        use ResourceKind::*;
        match self {
            Domain | Flavor | ShareType | VolumeType | ResourceClass | Trait | TsigKey => {
                &["name"]
            }
            DomainConfig => &["domain_id"],
            Project | User | Group => &["name", "domain_id"],
            GroupMembership => &["group_id", "user_id"],
            Role => &["name", "domain_id"],
            RoleInference => &["prior_role_id", "implied_role_id"],
            RoleAssignment => &[
                "user_id",
                "group_id",
                "role_id",
                "project_id",
                "domain_id",
                "system",
                "inherited",
            ],
            Region => &["id"],
            Service => &["type", "name"],
            Endpoint => &["service_id", "region_id", "interface"],
            NetworkQuota | ComputeQuota | VolumeQuota | ShareQuota | DnsQuota | SwiftAccount => {
                &["project_id"]
            }
            AddressScope | SubnetPool | Network | Router | Zone | SwiftContainer => {
                &["name", "project_id"]
            }
            Subnet | Port => &["name", "network_id"],
            RouterInterface => &["router_id", "subnet_id"],
            RbacPolicy => &["object_type", "object_id", "action", "target_tenant"],
            Recordset => &["zone_id", "name", "type"],
            FlavorAccess | ShareTypeAccess | VolumeTypeAccess => &["resource_id", "project_id"],
        }
    }

    /// Build the filter identifying `payload` among existing objects.
    /// Returns `None` when the payload carries none of the unique fields.
    pub fn unique_filter(&self, payload: &serde_json::Value) -> Option<Filter> {
        let mut filter = Filter::new();
        for field in self.unique_fields() {
            match payload.get(*field) {
                Some(serde_json::Value::String(s)) => filter.insert(*field, s.clone()),
                Some(serde_json::Value::Bool(b)) => filter.insert(*field, b.to_string()),
                Some(serde_json::Value::Number(n)) => filter.insert(*field, n.to_string()),
                _ => {}
            }
        }
        if filter.is_empty() { None } else { Some(filter) }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unique_filter_project() {
        let payload = json!({"name": "ops", "domain_id": "d1", "description": "x"});
        let filter = ResourceKind::Project.unique_filter(&payload).unwrap();
        assert_eq!(filter.get("name"), Some("ops"));
        assert_eq!(filter.get("domain_id"), Some("d1"));
        assert_eq!(filter.get("description"), None);
    }

    #[test]
    fn test_unique_filter_without_fields() {
        let payload = json!({"description": "x"});
        assert!(ResourceKind::Domain.unique_filter(&payload).is_none());
    }

    #[test]
    fn test_service_mapping() {
        assert_eq!(ResourceKind::Recordset.service(), ServiceType::Dns);
        assert_eq!(ResourceKind::ShareQuota.service(), ServiceType::SharedFilesystem);
        assert_eq!(ResourceKind::Trait.service(), ServiceType::Placement);
        assert!(ResourceKind::ComputeQuota.is_quota());
        assert!(!ResourceKind::Flavor.is_quota());
    }
}
