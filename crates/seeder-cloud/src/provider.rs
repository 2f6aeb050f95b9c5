//! Cloud capability trait definition

use crate::error::Result;
use crate::kind::{ResourceKind, ServiceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Uniform capability interface over every OpenStack service
///
/// Implementations hide pagination, authentication and per-service quirks
/// (envelopes, filter names, microversions) behind the object `kind`.
/// There is intentionally no delete: `revoke` only withdraws access grants
/// and group memberships.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Returns the implementation name (e.g., "openstack", "fake")
    fn name(&self) -> &str;

    /// Check that credentials are valid
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// List every object of `kind` matching `filter`, all pages joined
    async fn list(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>>;

    /// Fetch a single object; `Ok(None)` when the backend reports not-found
    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<Record>>;

    /// Create an object from `payload`
    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Record>;

    /// Apply `patch` to the object identified by `id`
    async fn update(&self, kind: ResourceKind, id: &str, patch: &Value) -> Result<Record>;

    /// Withdraw an access grant or membership described by `payload`
    async fn revoke(&self, kind: ResourceKind, payload: &Value) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Equality filter applied to `list`
///
/// Values are compared against the string form of the record field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter(BTreeMap<String, String>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// An observed object as returned by the backend, envelope removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Backend identifier
    pub id: String,

    /// Flattened object fields
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a JSON object, taking the id from `id_field`
    pub fn from_value(value: Value, id_field: &str) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let id = match fields.get(id_field)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self { id, fields })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Whether every filter entry equals the string form of the field
    pub fn matches(&self, filter: &Filter) -> bool {
        filter.iter().all(|(key, expected)| {
            if key == "id" {
                return &self.id == expected;
            }
            match self.fields.get(key) {
                Some(Value::String(s)) => s == expected,
                Some(Value::Bool(b)) => &b.to_string() == expected,
                Some(Value::Number(n)) => &n.to_string() == expected,
                _ => false,
            }
        })
    }
}

/// Retry policy for backend calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, first call included
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,

    /// Relative jitter applied to every delay (0.2 = ±20 %)
    pub jitter: f64,

    /// Upper bound on the total time spent retrying one call
    pub max_elapsed: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: 0.2,
            max_elapsed: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Nominal delay before retry number `attempt` (0-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(self.initial_delay.as_secs_f64() * factor)
    }

    /// Smallest delay the jitter can produce for retry number `attempt`
    pub fn min_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.base_delay(attempt).as_secs_f64() * (1.0 - self.jitter))
    }
}

/// Limits applied by the guard around a `CloudApi`
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub retry: RetryConfig,

    /// Hard deadline for a single backend call
    pub call_timeout: Duration,

    /// Concurrent in-flight calls allowed per service
    pub per_service_concurrency: usize,

    /// Overrides of the per-service cap
    pub service_overrides: BTreeMap<ServiceType, usize>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(30),
            per_service_concurrency: 4,
            service_overrides: BTreeMap::new(),
        }
    }
}
