//! Service catalog from the token
//!
//! Maps a `ServiceType` to the versioned root URL of that service, filtered
//! by region and interface.

use crate::error::{ClientError, Result};
use seeder_cloud::ServiceType;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,

    #[serde(default)]
    pub region_id: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    pub url: String,
}

impl CatalogEndpoint {
    fn in_region(&self, region: Option<&str>) -> bool {
        match region {
            None => true,
            Some(r) => self.region_id.as_deref() == Some(r) || self.region.as_deref() == Some(r),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Raw endpoint URL of `service` for `interface` in `region`
    pub fn endpoint(
        &self,
        service: ServiceType,
        region: Option<&str>,
        interface: &str,
    ) -> Result<String> {
        service
            .catalog_types()
            .iter()
            .find_map(|wanted| {
                self.entries
                    .iter()
                    .filter(|e| e.service_type == *wanted)
                    .flat_map(|e| e.endpoints.iter())
                    .find(|ep| ep.interface == interface && ep.in_region(region))
            })
            .map(|ep| ep.url.trim_end_matches('/').to_string())
            .ok_or_else(|| ClientError::NoEndpoint {
                service: service.to_string(),
                region: region.unwrap_or("*").to_string(),
                interface: interface.to_string(),
            })
    }

    /// Versioned root URL that resource paths are appended to
    pub fn service_root(
        &self,
        service: ServiceType,
        region: Option<&str>,
        interface: &str,
    ) -> Result<String> {
        let url = self.endpoint(service, region, interface)?;
        Ok(versioned(service, url))
    }
}

/// Append the API version segment for services whose catalog entries are
/// commonly registered unversioned
fn versioned(service: ServiceType, url: String) -> String {
    let suffix = match service {
        ServiceType::Identity => "/v3",
        ServiceType::Network => "/v2.0",
        ServiceType::Dns => "/v2",
        _ => return url,
    };
    if url.ends_with(suffix) {
        url
    } else {
        format!("{}{}", url, suffix)
    }
}

/// Swift account URL of `project_id`, derived from the token's own account
///
/// Storage URLs end in `AUTH_<project_id>`; the reseller prefix is kept and
/// the project swapped.
pub fn swift_account_url(object_store_root: &str, project_id: &str) -> String {
    match object_store_root.rfind("/AUTH_") {
        Some(pos) => format!("{}/AUTH_{}", &object_store_root[..pos], project_id),
        None => format!("{}/AUTH_{}", object_store_root, project_id),
    }
}
