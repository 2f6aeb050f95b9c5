//! In-memory cloud for engine tests
//!
//! Objects live in one map per kind. Every call is logged with the (tokio)
//! instant it was made, and failures can be scripted per operation and kind.

#![allow(dead_code)]

use async_trait::async_trait;
use seeder_cloud::{
    AuthStatus, CloudApi, CloudError, Filter, GuardConfig, Guarded, Record, ResourceKind, Result,
    RetryConfig,
};
use seeder_engine::{Engine, EngineOptions};
use seeder_spec::{SpecDocument, load_spec_str};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    Revoke,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub kind: ResourceKind,
    pub at: Instant,
}

struct Rule {
    op: Op,
    kind: ResourceKind,
    /// Only payloads (or filters) carrying this field value
    matching: Option<(String, String)>,
    /// `None` fails forever
    remaining: Option<usize>,
    error: CloudError,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ResourceKind, Vec<Record>>,
    calls: Vec<Call>,
    rules: Vec<Rule>,
}

pub struct FakeCloud {
    state: Mutex<State>,
    next_id: AtomicUsize,
    authenticated: AtomicBool,
    latency: Mutex<Duration>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicUsize::new(1),
            authenticated: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Every call takes this long before it is served
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn reject_credentials(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }

    /// Fail the next `times` calls of `op` on `kind`
    pub fn fail(&self, op: Op, kind: ResourceKind, times: usize, error: CloudError) {
        self.push_rule(op, kind, None, Some(times), error);
    }

    /// Fail every `op` on `kind` whose payload has `field == value`
    pub fn fail_matching(&self, op: Op, kind: ResourceKind, field: &str, value: &str, error: CloudError) {
        self.push_rule(op, kind, Some((field.into(), value.into())), None, error);
    }

    fn push_rule(
        &self,
        op: Op,
        kind: ResourceKind,
        matching: Option<(String, String)>,
        remaining: Option<usize>,
        error: CloudError,
    ) {
        self.state.lock().unwrap().rules.push(Rule {
            op,
            kind,
            matching,
            remaining,
            error,
        });
    }

    /// Store an object as if created out of band
    pub fn seed(&self, kind: ResourceKind, value: Value) -> String {
        let mut fields = match value {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let id = match fields.remove("id") {
            Some(Value::String(id)) => id,
            _ => self.new_id(kind),
        };
        if kind == ResourceKind::Region {
            fields.insert("id".into(), Value::String(id.clone()));
        }
        let record = Record::new(id.clone(), fields);
        self.state.lock().unwrap().objects.entry(kind).or_default().push(record);
        id
    }

    /// Change a field behind the engine's back
    pub fn set_field(&self, kind: ResourceKind, id: &str, field: &str, value: Value) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state
            .objects
            .get_mut(&kind)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
        {
            record.fields.insert(field.into(), value);
        }
    }

    pub fn objects(&self, kind: ResourceKind) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, kind: ResourceKind, field: &str, value: &str) -> Option<Record> {
        self.objects(kind)
            .into_iter()
            .find(|r| r.str(field) == Some(value))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn count_of(&self, op: Op, kind: ResourceKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.op == op && c.kind == kind)
            .count()
    }

    /// Creates and updates seen so far
    pub fn writes(&self) -> usize {
        self.count(Op::Create) + self.count(Op::Update)
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn new_id(&self, kind: ResourceKind) -> String {
        format!("{}-{}", kind, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Log the call and apply the first matching scripted failure
    fn enter(&self, op: Op, kind: ResourceKind, subject: Option<&Value>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            op,
            kind,
            at: Instant::now(),
        });
        let hit = state.rules.iter_mut().find(|rule| {
            rule.op == op
                && rule.kind == kind
                && rule.remaining != Some(0)
                && match (&rule.matching, subject) {
                    (None, _) => true,
                    (Some((field, value)), Some(subject)) => {
                        subject.get(field).and_then(Value::as_str) == Some(value.as_str())
                    }
                    (Some(_), None) => false,
                }
        });
        match hit {
            Some(rule) => {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(rule.error.clone())
            }
            None => Ok(()),
        }
    }
}

/// Quota sets exist for every project with these values
fn quota_defaults(kind: ResourceKind) -> Map<String, Value> {
    let defaults = match kind {
        ResourceKind::ComputeQuota => json!({"cores": 20, "ram": 51200, "instances": 10}),
        ResourceKind::NetworkQuota => json!({"network": 100, "subnet": 100, "port": 500}),
        _ => json!({}),
    };
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn filter_value(filter: &Filter) -> Value {
    Value::Object(
        filter
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn deep_merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(have)), Value::Object(want)) => deep_merge(have, want),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Same unique fields, absent fields compared as absent
fn same_identity(kind: ResourceKind, payload: &Value, record: &Record) -> bool {
    kind.unique_fields().iter().all(|field| {
        let want = payload.get(*field).filter(|v| !v.is_null());
        let have = if *field == "id" {
            Some(Value::String(record.id.clone()))
        } else {
            record.get(field).filter(|v| !v.is_null()).cloned()
        };
        want.cloned() == have
    })
}

#[async_trait]
impl CloudApi for FakeCloud {
    fn name(&self) -> &str {
        "fake"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(AuthStatus::ok("admin@Default"))
        } else {
            Ok(AuthStatus::failed("The request you have made requires authentication."))
        }
    }

    async fn list(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>> {
        self.pause().await;
        self.enter(Op::List, kind, Some(&filter_value(filter)))?;
        let mut state = self.state.lock().unwrap();
        let records = state.objects.entry(kind).or_default();
        if kind.is_quota()
            && let Some(project_id) = filter.get("project_id")
            && !records.iter().any(|r| r.id == project_id)
        {
            let mut fields = quota_defaults(kind);
            fields.insert("project_id".into(), Value::String(project_id.to_string()));
            records.push(Record::new(project_id, fields));
        }
        Ok(records.iter().filter(|r| r.matches(filter)).cloned().collect())
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<Record>> {
        self.pause().await;
        self.enter(Op::Get, kind, None)?;
        Ok(self.objects(kind).into_iter().find(|r| r.id == id))
    }

    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Record> {
        self.pause().await;
        self.enter(Op::Create, kind, Some(payload))?;
        let mut fields = payload.as_object().cloned().unwrap_or_default();
        let id = match fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => self.new_id(kind),
        };
        if kind != ResourceKind::Region {
            fields.remove("id");
        }
        let mut state = self.state.lock().unwrap();
        let records = state.objects.entry(kind).or_default();
        if records.iter().any(|r| same_identity(kind, payload, r)) {
            return Err(CloudError::Conflict(format!("{} already exists", kind)));
        }
        let record = Record::new(id, fields);
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, kind: ResourceKind, id: &str, patch: &Value) -> Result<Record> {
        self.pause().await;
        self.enter(Op::Update, kind, Some(patch))?;
        let patch = patch.as_object().cloned().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        let record = state
            .objects
            .get_mut(&kind)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| CloudError::NotFound(format!("{} {}", kind, id)))?;
        deep_merge(&mut record.fields, &patch);
        Ok(record.clone())
    }

    async fn revoke(&self, kind: ResourceKind, payload: &Value) -> Result<()> {
        self.pause().await;
        self.enter(Op::Revoke, kind, Some(payload))?;
        let filter = kind
            .unique_filter(payload)
            .ok_or_else(|| CloudError::BadRequest(format!("{} revoke without key", kind)))?;
        let mut state = self.state.lock().unwrap();
        if let Some(records) = state.objects.get_mut(&kind) {
            records.retain(|r| !r.matches(&filter));
        }
        Ok(())
    }
}

/// Guard tuned for tests: fast backoff, no jitter
pub fn guard_config() -> GuardConfig {
    GuardConfig {
        retry: RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: 0.0,
            max_elapsed: Duration::from_secs(30),
        },
        ..GuardConfig::default()
    }
}

pub struct Harness {
    pub cloud: Arc<Guarded<FakeCloud>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_guard(guard_config())
    }

    pub fn with_guard(config: GuardConfig) -> Self {
        Self {
            cloud: Arc::new(Guarded::new(FakeCloud::new(), config)),
        }
    }

    pub fn fake(&self) -> &FakeCloud {
        self.cloud.inner()
    }

    pub fn engine(&self, options: EngineOptions) -> Engine {
        Engine::new(self.cloud.clone(), options)
    }

    pub fn dry_run(&self) -> Engine {
        self.engine(EngineOptions {
            dry_run: true,
            ..EngineOptions::default()
        })
    }
}

pub fn spec(yaml: &str) -> SpecDocument {
    load_spec_str(yaml).unwrap()
}
