//! DNS zones, recordsets and TSIG keys

use serde::{Deserialize, Serialize};

/// DNS zone owned by a project
///
/// ```yaml
/// dns_zones:
///   - name: example.com.
///     email: hostmaster@example.com
///     recordsets:
///       - {name: www, type: A, records: [192.0.2.10]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneSpec {
    pub name: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `PRIMARY` or `SECONDARY`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recordsets: Vec<RecordsetSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordsetSpec {
    /// Relative name, `@` for the apex, or an absolute FQDN
    pub name: String,

    #[serde(rename = "type")]
    pub record_type: String,

    pub records: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TsigKeySpec {
    pub name: String,

    /// e.g. `hmac-sha256`
    pub algorithm: String,

    pub secret: String,

    pub scope: TsigScope,

    /// Pool ID for pool-scoped keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Zone name for zone-scoped keys; must be declared in the same project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsigScope {
    #[default]
    Pool,
    Zone,
}

impl TsigScope {
    /// Designate spells scopes in upper case on the wire
    pub fn as_wire(&self) -> &'static str {
        match self {
            TsigScope::Pool => "POOL",
            TsigScope::Zone => "ZONE",
        }
    }
}
