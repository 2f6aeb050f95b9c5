//! Networking records owned by a project

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressScopeSpec {
    pub name: String,

    pub ip_version: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetPoolSpec {
    pub name: String,

    pub prefixes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prefixlen: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_prefixlen: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prefixlen: Option<u8>,

    /// Address scope key (`<scope>@<project>@<domain>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Network with its subnets and ports
///
/// ```yaml
/// networks:
///   - name: private
///     subnets:
///       - {name: private-v4, cidr: 10.0.0.0/24, ip_version: 4}
///     ports:
///       - name: vip
///         fixed_ips: [{subnet: private-v4, ip_address: 10.0.0.10}]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,

    /// `router:external`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSpec {
    pub network_type: NetworkType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Flat,
    Vlan,
    Vxlan,
    Gre,
    Geneve,
    Local,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Flat => "flat",
            NetworkType::Vlan => "vlan",
            NetworkType::Vxlan => "vxlan",
            NetworkType::Gre => "gre",
            NetworkType::Geneve => "geneve",
            NetworkType::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    pub ip_version: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dhcp: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_nameservers: Vec<String>,

    /// Subnet pool key (`<pool>@<project>@<domain>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_pool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed_ips: Vec<FixedIpSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedIpSpec {
    /// Subnet key (`<subnet>@<network>@<project>@<domain>`)
    pub subnet: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_gateway: Option<GatewaySpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<RouterInterfaceSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySpec {
    /// External network key (`<network>@<project>@<domain>`)
    pub network: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_snat: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterInterfaceSpec {
    /// Subnet key (`<subnet>@<network>@<project>@<domain>`)
    pub subnet: String,
}

/// Network RBAC policy (top level)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RbacPolicySpec {
    /// Only `network` is supported
    pub object_type: String,

    /// Network key (`<network>@<project>@<domain>`)
    pub object: String,

    /// `access_as_shared` or `access_as_external`
    pub action: String,

    /// Project key, or `*` for every project
    pub target_project: String,
}
