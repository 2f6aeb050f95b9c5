//! OpenStack REST client
//!
//! Direct HTTP implementation of `CloudApi`. Handles the token lifecycle,
//! endpoint discovery, pagination and microversions; retries and
//! concurrency limits are applied by `seeder_cloud::Guarded` around it.

use crate::auth::{Credentials, Token};
use crate::error::{ClientError, Result};
use crate::pagination::{absolute, next_link};
use crate::routes::{Route, microversion, route};
use crate::wire::{self, error_message};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Method, Response, StatusCode};
use seeder_cloud::{AuthStatus, CloudApi, CloudError, Filter, Record, ResourceKind, ServiceType};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Guard against servers that keep returning the same next link
const MAX_PAGES: usize = 1000;

/// A single HTTP request against one service
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub service: ServiceType,
    pub method: Method,
    /// Path relative to the service root, or an absolute URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(service: ServiceType, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(service: ServiceType, path: impl Into<String>) -> Self {
        Self::new(service, Method::GET, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// OpenStack client acting with one set of credentials
pub struct OpenStackClient {
    http: reqwest::Client,
    credentials: Credentials,
    token: Mutex<Option<Arc<Token>>>,
}

impl OpenStackClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("openstack-seeder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            credentials,
            token: Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Cached token, re-issued when it is within the refresh margin
    pub(crate) async fn token(&self) -> Result<Arc<Token>> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.clone());
        }
        let token = Arc::new(self.authenticate().await?);
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn authenticate(&self) -> Result<Token> {
        let url = self.credentials.tokens_url();
        debug!(url = %url, "Requesting token");
        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&self.credentials.token_request())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text).unwrap_or_else(|| status.to_string());
            return Err(ClientError::Auth(format!("{}: {}", status, message)));
        }

        let subject = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Auth("response carries no X-Subject-Token".into()))?;
        let body: Value = response.json().await?;
        let token = Token::from_response(subject, body)?;
        info!(
            user = %token.user_name,
            expires_at = %token.expires_at,
            "Authenticated"
        );
        Ok(token)
    }

    /// Drop `stale` from the cache unless another task already replaced it
    async fn invalidate(&self, stale: &Token) {
        let mut cached = self.token.lock().await;
        if cached.as_ref().is_some_and(|t| t.value == stale.value) {
            *cached = None;
        }
    }

    pub(crate) fn root(&self, token: &Token, service: ServiceType) -> Result<String> {
        token.catalog.service_root(
            service,
            self.credentials.region_name.as_deref(),
            &self.credentials.interface,
        )
    }

    /// Send `req`; a 401 refreshes the token and retries once
    pub(crate) async fn send(&self, req: &Request) -> Result<Response> {
        let mut refreshed = false;
        loop {
            let token = self.token().await?;
            let url = if req.path.starts_with("http://") || req.path.starts_with("https://") {
                req.path.clone()
            } else {
                format!("{}/{}", self.root(&token, req.service)?, req.path)
            };

            let mut builder = self
                .http
                .request(req.method.clone(), &url)
                .header("X-Auth-Token", &token.value)
                .header(ACCEPT, "application/json");
            for (name, value) in microversion(req.service) {
                builder = builder.header(*name, *value);
            }
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if !req.query.is_empty() {
                builder = builder.query(&req.query);
            }
            if let Some(body) = &req.body {
                builder = builder.json(body);
            }

            debug!(method = %req.method, url = %url, "Sending request");
            let response = builder.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !refreshed {
                warn!(url = %url, "Token rejected, re-authenticating");
                self.invalidate(&token).await;
                refreshed = true;
                continue;
            }
            if status.is_success() {
                return Ok(response);
            }

            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(ClientError::Status {
                method: req.method.to_string(),
                url,
                status: status.as_u16(),
                message,
            });
        }
    }

    /// Send `req` and decode the body; empty bodies decode as `null`
    pub(crate) async fn send_json(&self, req: &Request) -> Result<Value> {
        let response = self.send(req).await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send `req`, mapping 404 to `None`
    pub(crate) async fn send_optional(&self, req: &Request) -> Result<Option<Value>> {
        match self.send_json(req).await {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send `req`, returning the response headers; 404 maps to `None`
    pub(crate) async fn send_head(&self, req: &Request) -> Result<Option<HeaderMap>> {
        match self.send(req).await {
            Ok(response) => Ok(Some(response.headers().clone())),
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch every page of a collection
    pub(crate) async fn list_pages(&self, first: Request, collection: &str) -> Result<Vec<Value>> {
        let token = self.token().await?;
        let root = self.root(&token, first.service)?;

        let mut items = Vec::new();
        let mut req = first;
        for _ in 0..MAX_PAGES {
            let body = self.send_json(&req).await?;
            let page = body
                .get(collection)
                .and_then(Value::as_array)
                .ok_or_else(|| ClientError::Decode(format!("response lacks '{}'", collection)))?;
            items.extend(page.iter().cloned());

            match next_link(&body, collection) {
                Some(link) if !page.is_empty() => {
                    let next = absolute(&root, &link);
                    if next == req.path {
                        break;
                    }
                    // next links carry the full query string
                    req.path = next;
                    req.query.clear();
                }
                _ => break,
            }
        }
        debug!(collection, count = items.len(), "Listed collection");
        Ok(items)
    }

    // ============ plain collection routes ============

    async fn list_routed(&self, kind: ResourceKind, r: &Route, filter: &Filter) -> Result<Vec<Record>> {
        let parent = match r.parent {
            Some(field) => Some(
                filter
                    .get(field)
                    .ok_or(ClientError::missing(kind, field))?
                    .to_string(),
            ),
            None => None,
        };
        let mut req = Request::get(r.service, r.collection(parent.as_deref()));
        for (key, value) in filter.iter() {
            if r.query.contains(&key.as_str()) {
                req = req.query(key.clone(), value.clone());
            }
        }
        if r.sudo_project
            && let Some(project) = filter.get("project_id")
        {
            req = req.header("X-Auth-Sudo-Project-ID", project);
        }

        let items = self.list_pages(req, r.plural).await?;
        items
            .into_iter()
            .map(|mut item| {
                if let (Some(field), Some(id)) = (r.parent, parent.as_deref()) {
                    item[field] = Value::String(id.to_string());
                }
                wire::record(kind, item)
            })
            .collect()
    }

    async fn get_routed(&self, kind: ResourceKind, r: &Route, id: &str) -> Result<Option<Record>> {
        if r.parent.is_some() {
            return Err(ClientError::Unsupported {
                kind,
                operation: "get",
            });
        }
        let req = Request::get(r.service, format!("{}/{}", r.path, id));
        match self.send_optional(&req).await? {
            Some(body) => Ok(Some(wire::record(kind, wire::unwrap(r.singular, body)?)?)),
            None => Ok(None),
        }
    }

    async fn write_routed(
        &self,
        kind: ResourceKind,
        r: &Route,
        id: Option<&str>,
        payload: &Value,
    ) -> Result<Record> {
        let parent = match r.parent {
            Some(field) => Some(wire::require(kind, payload, field)?),
            None => None,
        };
        let mut strip: Vec<&str> = r.parent.into_iter().collect();
        let project = if r.sudo_project {
            strip.push("project_id");
            wire::str_field(payload, "project_id")
        } else {
            None
        };

        let collection = r.collection(parent.as_deref());
        let (method, path) = match id {
            Some(id) => (r.update.clone(), format!("{}/{}", collection, id)),
            None => (Method::POST, collection),
        };
        let body = wire::wrap(r.singular, wire::without(payload, &strip));
        let mut req = Request::new(r.service, method, path).json(body);
        if let Some(project) = project {
            req = req.header("X-Auth-Sudo-Project-ID", project);
        }

        let response = self.send_json(&req).await?;
        let mut object = wire::unwrap(r.singular, response)?;
        if let (Some(field), Some(parent)) = (r.parent, parent) {
            object[field] = Value::String(parent);
        }
        wire::record(kind, object)
    }
}

#[async_trait]
impl CloudApi for OpenStackClient {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn check_auth(&self) -> seeder_cloud::Result<AuthStatus> {
        match self.token().await {
            Ok(token) => {
                let scope = token
                    .project_id
                    .as_deref()
                    .map(|p| format!(" (project {})", p))
                    .unwrap_or_default();
                Ok(AuthStatus::ok(format!("{}{}", token.user_name, scope)))
            }
            Err(ClientError::Auth(message)) => Ok(AuthStatus::failed(message)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, kind: ResourceKind, filter: &Filter) -> seeder_cloud::Result<Vec<Record>> {
        use ResourceKind as K;
        let records = match kind {
            K::DomainConfig => self.list_domain_config(filter).await?,
            K::GroupMembership => self.list_memberships(filter).await?,
            K::RoleInference => self.list_role_inferences().await?,
            K::RoleAssignment => self.list_role_assignments(filter).await?,
            K::RouterInterface => self.list_router_interfaces(filter).await?,
            K::Flavor => self.list_flavors(filter).await?,
            K::VolumeType | K::ShareType => self.list_types(kind, filter).await?,
            K::FlavorAccess | K::VolumeTypeAccess | K::ShareTypeAccess => {
                self.list_access(kind, filter).await?
            }
            K::SwiftAccount => self.list_swift_account(filter).await?,
            K::SwiftContainer => self.list_swift_containers(filter).await?,
            K::ResourceClass | K::Trait => self.list_placement(kind).await?,
            k if k.is_quota() => self.list_quota(k, filter).await?,
            _ => {
                let r = route(kind).ok_or(ClientError::Unsupported {
                    kind,
                    operation: "list",
                })?;
                self.list_routed(kind, &r, filter).await?
            }
        };
        Ok(records.into_iter().filter(|r| r.matches(filter)).collect())
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> seeder_cloud::Result<Option<Record>> {
        use ResourceKind as K;
        let record = match kind {
            K::Flavor => self.get_flavor(id).await?,
            K::VolumeType | K::ShareType => self.get_type(kind, id).await?,
            k if k.is_quota() => self.get_quota(k, id).await?,
            _ => match route(kind) {
                Some(r) => self.get_routed(kind, &r, id).await?,
                None => {
                    return Err(ClientError::Unsupported {
                        kind,
                        operation: "get",
                    }
                    .into());
                }
            },
        };
        Ok(record)
    }

    async fn create(&self, kind: ResourceKind, payload: &Value) -> seeder_cloud::Result<Record> {
        use ResourceKind as K;
        debug!(kind = %kind, "Creating object");
        let record = match kind {
            K::DomainConfig => self.put_domain_config(payload, true).await?,
            K::GroupMembership => self.add_membership(payload).await?,
            K::RoleInference => self.create_role_inference(payload).await?,
            K::RoleAssignment => self.grant_role(payload).await?,
            K::RouterInterface => self.add_router_interface(payload).await?,
            K::Flavor => self.create_flavor(payload).await?,
            K::VolumeType | K::ShareType => self.create_type(kind, payload).await?,
            K::FlavorAccess | K::VolumeTypeAccess | K::ShareTypeAccess => {
                self.grant_access(kind, payload).await?
            }
            K::SwiftAccount => self.create_swift_account(payload).await?,
            K::SwiftContainer => self.write_swift_container(payload, true).await?,
            K::ResourceClass | K::Trait => self.create_placement(kind, payload).await?,
            k if k.is_quota() => self.put_quota(k, payload).await?,
            _ => {
                let r = route(kind).ok_or(ClientError::Unsupported {
                    kind,
                    operation: "create",
                })?;
                self.write_routed(kind, &r, None, payload).await?
            }
        };
        Ok(record)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        patch: &Value,
    ) -> seeder_cloud::Result<Record> {
        use ResourceKind as K;
        debug!(kind = %kind, id, "Updating object");
        let record = match kind {
            K::DomainConfig => self.put_domain_config(patch, false).await?,
            K::Flavor => self.update_flavor(id, patch).await?,
            K::VolumeType | K::ShareType => self.update_type(kind, id, patch).await?,
            K::SwiftContainer => self.write_swift_container(patch, false).await?,
            k if k.is_quota() => self.put_quota(k, patch).await?,
            _ => match route(kind) {
                Some(r) => self.write_routed(kind, &r, Some(id), patch).await?,
                None => {
                    return Err(ClientError::Unsupported {
                        kind,
                        operation: "update",
                    }
                    .into());
                }
            },
        };
        Ok(record)
    }

    async fn revoke(&self, kind: ResourceKind, payload: &Value) -> seeder_cloud::Result<()> {
        use ResourceKind as K;
        debug!(kind = %kind, "Revoking grant");
        match kind {
            K::GroupMembership => self.remove_membership(payload).await?,
            K::FlavorAccess | K::VolumeTypeAccess | K::ShareTypeAccess => {
                self.revoke_access(kind, payload).await?
            }
            _ => {
                return Err(CloudError::from(ClientError::Unsupported {
                    kind,
                    operation: "revoke",
                }));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_cloud::ErrorKind;

    fn unreachable() -> OpenStackClient {
        // port 9 (discard) is closed on test hosts
        let credentials = Credentials::password("http://127.0.0.1:9", "admin", "secret", "admin");
        OpenStackClient::new(credentials).unwrap()
    }

    #[test]
    fn test_request_builder() {
        let req = Request::get(ServiceType::Network, "ports")
            .query("device_id", "r1")
            .header("X-Auth-Sudo-Project-ID", "p1");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query, vec![("device_id".to_string(), "r1".to_string())]);
        assert_eq!(req.headers.len(), 1);
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_identity_is_a_network_error() {
        let client = unreachable();
        let err = client.check_auth().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_unsupported_revoke() {
        let client = unreachable();
        let err = client
            .revoke(ResourceKind::Project, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
