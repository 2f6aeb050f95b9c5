//! Typed spec model
//!
//! The YAML document rooted at `openstack:` deserializes directly into these
//! records. Every record rejects unknown keys. After loading, the
//! normaliser rewrites identifiers in place, so the same types describe both
//! the raw and the canonical document.

mod catalog;
mod compute;
mod dns;
mod identity;
mod network;
mod storage;

// Re-exports
pub use catalog::*;
pub use compute::*;
pub use dns::*;
pub use identity::*;
pub use network::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// The file as written: a single `openstack` root key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecFile {
    pub openstack: SpecDocument,
}

/// Desired tenancy of one OpenStack cloud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecDocument {
    /// Global roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_inferences: Vec<RoleInferenceSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<RegionSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flavors: Vec<FlavorSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub share_types: Vec<ShareTypeSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_types: Vec<VolumeTypeSpec>,

    /// Custom placement resource classes (`CUSTOM_*`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_classes: Vec<String>,

    /// Custom placement traits (`CUSTOM_*`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rbac_policies: Vec<RbacPolicySpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<DomainSpec>,
}

impl SpecDocument {
    pub fn domain(&self, name: &str) -> Option<&DomainSpec> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Find a declared project by its `<project>@<domain>` key
    pub fn project(&self, key: &str) -> Option<&ProjectSpec> {
        let (name, domain) = key.split_once('@')?;
        self.domain(domain)?.projects.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        *self == SpecDocument::default()
    }
}

/// Visibility of flavors, share types and volume types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }

    fn is_default(&self) -> bool {
        *self == Visibility::default()
    }
}

/// Serde helpers shared by the model modules
pub(crate) mod de {
    use serde::{Deserialize, Deserializer};
    use std::collections::BTreeMap;

    /// Scalar accepted where the backend expects a string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        Float(f64),
        Str(String),
    }

    impl Scalar {
        fn into_string(self) -> String {
            match self {
                Scalar::Bool(b) => b.to_string(),
                Scalar::Int(i) => i.to_string(),
                Scalar::Float(f) => f.to_string(),
                Scalar::Str(s) => s,
            }
        }
    }

    /// Map of string-ish scalars, as used by extra specs and metadata
    pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.into_string())).collect())
    }

    pub fn is_false(value: &bool) -> bool {
        !*value
    }
}
