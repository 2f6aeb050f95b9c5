//! Flavors

use super::Visibility;
use super::de::{is_false, string_map};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute flavor (top level)
///
/// Sizing fields cannot be changed once the flavor exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlavorSpec {
    pub name: String,

    /// Fixed flavor ID; generated by nova when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub vcpus: u32,

    /// Memory in MiB
    pub ram: u64,

    /// Root disk in GiB
    pub disk: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rxtx_factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Visibility::is_default")]
    pub visibility: Visibility,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(
        default,
        deserialize_with = "string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub extra_specs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessList>,
}

/// Projects granted access to a private flavor, share type or volume type
///
/// Grants are added only; with `exclusive: true` grants to projects not
/// listed here are withdrawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessList {
    /// Project keys (`<project>@<domain>`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive: bool,
}
