//! `clouds.yaml` parsing
//!
//! Only the keys the seeder needs are read; everything else an
//! openstacksdk-style file carries is ignored.

use crate::error::{ConfigError, Result};
use seeder_openstack::{AuthMethod, Credentials};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: BTreeMap<String, CloudEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudEntry {
    #[serde(default)]
    pub auth: AuthSection,

    /// `password` or `v3applicationcredential`; inferred when absent
    #[serde(default)]
    pub auth_type: Option<String>,

    #[serde(default)]
    pub region_name: Option<String>,

    #[serde(default)]
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSection {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_domain_name: Option<String>,
    pub project_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub system_scope: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<String>,
}

impl CloudsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: CloudsFile = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), clouds = file.clouds.len(), "Loaded clouds file");
        Ok(file)
    }

    /// Credentials of the cloud called `name`
    pub fn credentials(&self, name: &str, path: &Path) -> Result<Credentials> {
        let entry = self
            .clouds
            .get(name)
            .ok_or_else(|| ConfigError::CloudNotFound {
                name: name.to_string(),
                path: path.to_path_buf(),
                available: self.clouds.keys().cloned().collect(),
            })?;
        entry.credentials(&format!("cloud '{}'", name))
    }
}

impl CloudEntry {
    pub fn credentials(&self, source_name: &str) -> Result<Credentials> {
        let missing = |field: &str| ConfigError::MissingField {
            source_name: source_name.to_string(),
            field: field.to_string(),
        };
        let auth = &self.auth;
        let auth_url = auth.auth_url.clone().ok_or_else(|| missing("auth.auth_url"))?;

        let use_app_credential = match self.auth_type.as_deref() {
            Some("v3applicationcredential") => true,
            Some("password") | Some("v3password") => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: format!("{} auth_type", source_name),
                    message: format!("unsupported auth type '{}'", other),
                });
            }
            None => auth.application_credential_id.is_some(),
        };

        let method = if use_app_credential {
            AuthMethod::ApplicationCredential {
                id: auth
                    .application_credential_id
                    .clone()
                    .ok_or_else(|| missing("auth.application_credential_id"))?,
                secret: auth
                    .application_credential_secret
                    .clone()
                    .ok_or_else(|| missing("auth.application_credential_secret"))?,
            }
        } else {
            AuthMethod::Password {
                username: auth.username.clone().ok_or_else(|| missing("auth.username"))?,
                password: auth.password.clone().ok_or_else(|| missing("auth.password"))?,
                user_domain_name: auth
                    .user_domain_name
                    .clone()
                    .unwrap_or_else(|| "Default".into()),
                project_name: auth.project_name.clone(),
                project_domain_name: auth
                    .project_domain_name
                    .clone()
                    .unwrap_or_else(|| "Default".into()),
                system_scope: auth.system_scope.clone(),
            }
        };

        Ok(Credentials {
            auth_url,
            method,
            region_name: self.region_name.clone(),
            interface: self.interface.clone().unwrap_or_else(|| "public".into()),
        })
    }
}
