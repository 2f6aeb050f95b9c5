//! REST routes of the kinds that follow the plain collection pattern
//!
//! `GET <path>` lists, `GET <path>/<id>` shows, `POST <path>` creates and
//! `<update> <path>/<id>` modifies. Kinds with bespoke endpoints (quotas,
//! access grants, memberships, assignments...) are handled by the service
//! modules and have no route here.

use reqwest::Method;
use seeder_cloud::{ResourceKind, ServiceType};

#[derive(Debug, Clone)]
pub struct Route {
    pub service: ServiceType,

    /// Collection path relative to the service root; `{}` is replaced by the
    /// value of `parent`
    pub path: &'static str,

    /// Payload field naming the parent object in `path`
    pub parent: Option<&'static str>,

    /// Envelope of a single object; designate returns bare objects
    pub singular: Option<&'static str>,

    /// Key of the list in collection responses
    pub plural: &'static str,

    pub update: Method,

    /// Filter fields the server understands as query parameters.
    /// Every filter field is applied client-side as well.
    pub query: &'static [&'static str],

    /// Project scoping goes through `X-Auth-Sudo-Project-ID` instead of a
    /// body field
    pub sudo_project: bool,
}

impl Route {
    fn new(
        service: ServiceType,
        path: &'static str,
        singular: Option<&'static str>,
        plural: &'static str,
    ) -> Self {
        Self {
            service,
            path,
            parent: None,
            singular,
            plural,
            update: Method::PUT,
            query: &[],
            sudo_project: false,
        }
    }

    /// Collection path with the parent substituted
    pub fn collection(&self, parent_id: Option<&str>) -> String {
        match parent_id {
            Some(id) => self.path.replacen("{}", id, 1),
            None => self.path.to_string(),
        }
    }
}

fn keystone(
    path: &'static str,
    singular: &'static str,
    plural: &'static str,
    query: &'static [&'static str],
) -> Route {
    Route {
        update: Method::PATCH,
        query,
        ..Route::new(ServiceType::Identity, path, Some(singular), plural)
    }
}

fn neutron(path: &'static str, singular: &'static str, plural: &'static str) -> Route {
    Route {
        query: &["name", "project_id", "network_id", "object_id", "object_type"],
        ..Route::new(ServiceType::Network, path, Some(singular), plural)
    }
}

pub fn route(kind: ResourceKind) -> Option<Route> {
    use ResourceKind as K;
    use ServiceType as S;

    let route = match kind {
        K::Domain => keystone("domains", "domain", "domains", &["name"]),
        K::Project => keystone(
            "projects",
            "project",
            "projects",
            &["name", "domain_id", "parent_id"],
        ),
        K::User => keystone("users", "user", "users", &["name", "domain_id"]),
        K::Group => keystone("groups", "group", "groups", &["name", "domain_id"]),
        K::Role => keystone("roles", "role", "roles", &["name", "domain_id"]),
        K::Region => keystone("regions", "region", "regions", &["parent_region_id"]),
        K::Service => keystone("services", "service", "services", &["type"]),
        K::Endpoint => keystone(
            "endpoints",
            "endpoint",
            "endpoints",
            &["service_id", "interface", "region_id"],
        ),
        K::AddressScope => neutron("address-scopes", "address_scope", "address_scopes"),
        K::SubnetPool => neutron("subnetpools", "subnetpool", "subnetpools"),
        K::Network => neutron("networks", "network", "networks"),
        K::Subnet => neutron("subnets", "subnet", "subnets"),
        K::Router => neutron("routers", "router", "routers"),
        K::Port => neutron("ports", "port", "ports"),
        K::RbacPolicy => neutron("rbac-policies", "rbac_policy", "rbac_policies"),
        K::Zone => Route {
            update: Method::PATCH,
            query: &["name"],
            sudo_project: true,
            ..Route::new(S::Dns, "zones", None, "zones")
        },
        K::Recordset => Route {
            parent: Some("zone_id"),
            query: &["name", "type"],
            sudo_project: true,
            ..Route::new(S::Dns, "zones/{}/recordsets", None, "recordsets")
        },
        K::TsigKey => Route {
            update: Method::PATCH,
            query: &["name"],
            ..Route::new(S::Dns, "tsigkeys", None, "tsigkeys")
        },
        _ => return None,
    };
    Some(route)
}

/// Microversion headers sent with every request to `service`
pub fn microversion(service: ServiceType) -> &'static [(&'static str, &'static str)] {
    match service {
        ServiceType::Compute => &[
            ("OpenStack-API-Version", "compute 2.61"),
            ("X-OpenStack-Nova-API-Version", "2.61"),
        ],
        ServiceType::Placement => &[("OpenStack-API-Version", "placement 1.7")],
        ServiceType::SharedFilesystem => &[("X-OpenStack-Manila-API-Version", "2.50")],
        ServiceType::BlockStorage => &[("OpenStack-API-Version", "volume 3.50")],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystone_routes_patch() {
        let r = route(ResourceKind::Project).unwrap();
        assert_eq!(r.service, ServiceType::Identity);
        assert_eq!(r.update, Method::PATCH);
        assert_eq!(r.singular, Some("project"));
        assert!(r.query.contains(&"domain_id"));
    }

    #[test]
    fn test_recordset_route_uses_parent() {
        let r = route(ResourceKind::Recordset).unwrap();
        assert_eq!(r.collection(Some("z1")), "zones/z1/recordsets");
        assert_eq!(r.singular, None);
        assert!(r.sudo_project);
    }

    #[test]
    fn test_bespoke_kinds_have_no_route() {
        assert!(route(ResourceKind::NetworkQuota).is_none());
        assert!(route(ResourceKind::RoleAssignment).is_none());
        assert!(route(ResourceKind::FlavorAccess).is_none());
    }

    #[test]
    fn test_microversions() {
        assert_eq!(
            microversion(ServiceType::Placement),
            &[("OpenStack-API-Version", "placement 1.7")]
        );
        assert!(microversion(ServiceType::Identity).is_empty());
    }
}
