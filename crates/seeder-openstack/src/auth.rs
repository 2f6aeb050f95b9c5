//! Keystone v3 authentication
//!
//! Password and application-credential grants. Tokens are cached by the
//! client until shortly before they expire.

use crate::catalog::Catalog;
use crate::error::{ClientError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Tokens are refreshed this many seconds before their expiry
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Credentials of the account the seeder acts as
///
/// Built by the caller (typically from `clouds.yaml` or `OS_*` variables)
/// and handed to the client explicitly.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Identity endpoint, with or without the `/v3` suffix
    pub auth_url: String,

    pub method: AuthMethod,

    /// Region used for endpoint discovery; any region when absent
    #[serde(default)]
    pub region_name: Option<String>,

    /// Endpoint interface used for discovery
    #[serde(default = "default_interface")]
    pub interface: String,
}

fn default_interface() -> String {
    "public".to_string()
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    Password {
        username: String,
        password: String,
        #[serde(default = "default_domain")]
        user_domain_name: String,
        #[serde(default)]
        project_name: Option<String>,
        #[serde(default = "default_domain")]
        project_domain_name: String,
        /// Request a system-scoped token (`all`) instead of a project scope
        #[serde(default)]
        system_scope: Option<String>,
    },
    ApplicationCredential {
        id: String,
        secret: String,
    },
}

fn default_domain() -> String {
    "Default".to_string()
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match &self.method {
            AuthMethod::Password { username, .. } => format!("password({})", username),
            AuthMethod::ApplicationCredential { id, .. } => {
                format!("application_credential({})", id)
            }
        };
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("method", &method)
            .field("region_name", &self.region_name)
            .field("interface", &self.interface)
            .finish()
    }
}

impl Credentials {
    pub fn password(
        auth_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            method: AuthMethod::Password {
                username: username.into(),
                password: password.into(),
                user_domain_name: default_domain(),
                project_name: Some(project_name.into()),
                project_domain_name: default_domain(),
                system_scope: None,
            },
            region_name: None,
            interface: default_interface(),
        }
    }

    pub fn application_credential(
        auth_url: impl Into<String>,
        id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            method: AuthMethod::ApplicationCredential {
                id: id.into(),
                secret: secret.into(),
            },
            region_name: None,
            interface: default_interface(),
        }
    }

    /// `POST` target for token requests
    pub fn tokens_url(&self) -> String {
        format!("{}/auth/tokens", identity_root(&self.auth_url))
    }

    /// Body of the token request
    pub fn token_request(&self) -> Value {
        match &self.method {
            AuthMethod::Password {
                username,
                password,
                user_domain_name,
                project_name,
                project_domain_name,
                system_scope,
            } => {
                let mut auth = json!({
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": username,
                                "domain": {"name": user_domain_name},
                                "password": password,
                            }
                        }
                    }
                });
                if let Some(system) = system_scope {
                    let mut target = serde_json::Map::new();
                    target.insert(system.clone(), Value::Bool(true));
                    auth["scope"] = json!({ "system": target });
                } else if let Some(project) = project_name {
                    auth["scope"] = json!({
                        "project": {"name": project, "domain": {"name": project_domain_name}}
                    });
                }
                json!({ "auth": auth })
            }
            AuthMethod::ApplicationCredential { id, secret } => json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {"id": id, "secret": secret}
                    }
                }
            }),
        }
    }
}

/// Identity root URL ending in `/v3`
pub fn identity_root(auth_url: &str) -> String {
    let trimmed = auth_url.trim_end_matches('/');
    if trimmed.ends_with("/v3") {
        trimmed.to_string()
    } else {
        format!("{}/v3", trimmed)
    }
}

/// Issued token with its catalog
#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub catalog: Catalog,
    pub user_id: String,
    pub user_name: String,
    /// Project the token is scoped to, if any
    pub project_id: Option<String>,
}

impl Token {
    /// Whether the token can still be used at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }

    /// Build a token from the `X-Subject-Token` header and response body
    pub fn from_response(subject: String, body: Value) -> Result<Self> {
        let response: TokenResponse = serde_json::from_value(body)
            .map_err(|e| ClientError::Decode(format!("token response: {}", e)))?;
        let body = response.token;
        Ok(Self {
            value: subject,
            expires_at: body.expires_at,
            catalog: Catalog::new(body.catalog),
            user_id: body.user.id,
            user_name: body.user.name,
            project_id: body.project.map(|p| p.id),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    expires_at: DateTime<Utc>,
    #[serde(default)]
    catalog: Vec<crate::catalog::CatalogEntry>,
    user: NamedRef,
    #[serde(default)]
    project: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    id: String,
    #[serde(default)]
    name: String,
}
