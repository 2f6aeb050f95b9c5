//! Symbolic key to remote id resolution
//!
//! One resolver lives for one run. Entries are filled lazily by listing the
//! backend on first miss, and eagerly when a reconciler creates or observes
//! an object. Concurrent misses on the same key wait on that key's mutex
//! and share the single lookup. Not-found results are never cached, so an
//! object created later in the run is found on the next attempt.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use seeder_cloud::{CloudApi, CloudError, Filter, Record, ResourceKind, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::debug;

/// Prefix of the ids handed out for objects a dry run would create
pub const PLACEHOLDER_PREFIX: &str = "dry-run:";

pub fn placeholder(key: &str) -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, key)
}

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

type Slot = Arc<Mutex<Option<String>>>;

pub struct Resolver {
    cloud: Arc<dyn CloudApi>,
    slots: StdMutex<HashMap<(ResourceKind, String), Slot>>,
}

impl Resolver {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            cloud,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    fn slot(&self, kind: ResourceKind, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry((kind, key.to_string()))
            .or_default()
            .clone()
    }

    /// Record the id of an object reconciled in this run
    pub async fn insert(&self, kind: ResourceKind, key: &str, id: impl Into<String>) {
        let id = id.into();
        debug!(kind = %kind, key, id = %id, "Caching id");
        *self.slot(kind, key).lock().await = Some(id);
    }

    /// Cached id without a backend lookup
    pub async fn cached(&self, kind: ResourceKind, key: &str) -> Option<String> {
        self.slot(kind, key).lock().await.clone()
    }

    pub async fn contains(&self, kind: ResourceKind, key: &str) -> bool {
        self.cached(kind, key).await.is_some()
    }

    /// Remote id of `key`, looked up on first use
    ///
    /// Fails with `unresolved-reference` when nothing matches and with
    /// `ambiguous` when more than one object does.
    pub fn resolve<'a>(&'a self, kind: ResourceKind, key: &'a str) -> BoxFuture<'a, Result<String>> {
        async move {
            let slot = self.slot(kind, key);
            let mut cached = slot.lock().await;
            if let Some(id) = cached.as_ref() {
                return Ok(id.clone());
            }
            match self.lookup(kind, key).await? {
                Some(id) => {
                    *cached = Some(id.clone());
                    Ok(id)
                }
                None => Err(CloudError::UnresolvedReference(format!("{} {}", kind, key))),
            }
        }
        .boxed()
    }

    async fn lookup(&self, kind: ResourceKind, key: &str) -> Result<Option<String>> {
        let (filter, global_only) = self.filter_for(kind, key).await?;
        if filter.iter().any(|(_, v)| is_placeholder(v)) {
            // parent exists only in a dry run
            return Ok(None);
        }
        debug!(kind = %kind, key, filter = %filter, "Resolving reference");
        let found: Vec<Record> = self
            .cloud
            .list(kind, &filter)
            .await?
            .into_iter()
            .filter(|r| !global_only || is_global(r))
            .collect();
        match found.as_slice() {
            [] => Ok(None),
            [record] => Ok(Some(record.id.clone())),
            _ => Err(CloudError::Ambiguous(format!(
                "{} {} matches {} objects",
                kind,
                key,
                found.len()
            ))),
        }
    }

    /// List filter identifying `key`, parents resolved
    ///
    /// The flag is set for global roles, whose lookup has to exclude
    /// domain-specific roles of the same name.
    async fn filter_for(&self, kind: ResourceKind, key: &str) -> Result<(Filter, bool)> {
        use ResourceKind as K;
        let unresolvable = || CloudError::UnresolvedReference(format!("{} {}", kind, key));

        let filter = match kind {
            K::Domain => Filter::new().with("name", key),
            K::Project | K::User | K::Group => {
                let (name, domain) = split_key(kind, key)?;
                let domain_id = self.resolve(K::Domain, domain).await?;
                Filter::new().with("name", name).with("domain_id", domain_id)
            }
            K::Role => match key.split_once('@') {
                Some((name, domain)) => {
                    let domain_id = self.resolve(K::Domain, domain).await?;
                    Filter::new().with("name", name).with("domain_id", domain_id)
                }
                None => return Ok((Filter::new().with("name", key), true)),
            },
            K::Region => Filter::new().with("id", key),
            K::Service => Filter::new().with("name", key),
            K::AddressScope | K::SubnetPool | K::Network | K::Router | K::Zone => {
                let (name, project) = split_key(kind, key)?;
                let project_id = self.resolve(K::Project, project).await?;
                Filter::new().with("name", name).with("project_id", project_id)
            }
            K::Subnet | K::Port => {
                let (name, network) = split_key(kind, key)?;
                let network_id = self.resolve(K::Network, network).await?;
                Filter::new().with("name", name).with("network_id", network_id)
            }
            K::Recordset => {
                let (head, zone) = split_key(kind, key)?;
                let (name, record_type) = head.rsplit_once('/').ok_or_else(unresolvable)?;
                let (_, project) = split_key(kind, zone)?;
                let zone_id = self.resolve(K::Zone, zone).await?;
                let project_id = self.resolve(K::Project, project).await?;
                Filter::new()
                    .with("zone_id", zone_id)
                    .with("name", name)
                    .with("type", record_type)
                    .with("project_id", project_id)
            }
            K::Flavor | K::ShareType | K::VolumeType | K::ResourceClass | K::Trait => {
                Filter::new().with("name", key)
            }
            // keyed by project for uniqueness in the plan; names are global
            K::TsigKey => Filter::new().with("name", seeder_spec::key::name(key)),
            _ => return Err(unresolvable()),
        };
        Ok((filter, false))
    }
}

/// `name@scope` into its first segment and the rest
fn split_key(kind: ResourceKind, key: &str) -> Result<(&str, &str)> {
    key.split_once('@')
        .ok_or_else(|| CloudError::UnresolvedReference(format!("{} {}", kind, key)))
}

/// Roles without a domain
pub fn is_global(record: &Record) -> bool {
    matches!(record.get("domain_id"), None | Some(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seeder_cloud::AuthStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// One domain `acme`, answered slowly, with lists counted
    #[derive(Default)]
    struct SlowDomains {
        lists: AtomicUsize,
    }

    #[async_trait]
    impl CloudApi for SlowDomains {
        fn name(&self) -> &str {
            "slow"
        }

        async fn check_auth(&self) -> Result<AuthStatus> {
            Ok(AuthStatus::ok("test"))
        }

        async fn list(&self, _kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            let mut fields = serde_json::Map::new();
            fields.insert("name".into(), Value::String("acme".into()));
            let record = Record::new("d1", fields);
            Ok(if record.matches(filter) {
                vec![record]
            } else {
                Vec::new()
            })
        }

        async fn get(&self, _kind: ResourceKind, _id: &str) -> Result<Option<Record>> {
            Ok(None)
        }

        async fn create(&self, _kind: ResourceKind, _payload: &Value) -> Result<Record> {
            Err(CloudError::BadRequest("read only".into()))
        }

        async fn update(&self, _kind: ResourceKind, _id: &str, _patch: &Value) -> Result<Record> {
            Err(CloudError::BadRequest("read only".into()))
        }

        async fn revoke(&self, _kind: ResourceKind, _payload: &Value) -> Result<()> {
            Err(CloudError::BadRequest("read only".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_lookup() {
        let cloud = Arc::new(SlowDomains::default());
        let resolver = Resolver::new(cloud.clone());

        let (a, b) = tokio::join!(
            resolver.resolve(ResourceKind::Domain, "acme"),
            resolver.resolve(ResourceKind::Domain, "acme"),
        );
        assert_eq!(a.unwrap(), "d1");
        assert_eq!(b.unwrap(), "d1");
        assert_eq!(cloud.lists.load(Ordering::SeqCst), 1);

        // later hits come from the cache
        assert_eq!(resolver.resolve(ResourceKind::Domain, "acme").await.unwrap(), "d1");
        assert_eq!(cloud.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_cached() {
        let cloud = Arc::new(SlowDomains::default());
        let resolver = Resolver::new(cloud.clone());

        for _ in 0..2 {
            let err = resolver
                .resolve(ResourceKind::Domain, "globex")
                .await
                .unwrap_err();
            assert_eq!(err.kind(), seeder_cloud::ErrorKind::UnresolvedReference);
        }
        assert_eq!(cloud.lists.load(Ordering::SeqCst), 2);
        assert!(!resolver.contains(ResourceKind::Domain, "globex").await);
    }

    #[test]
    fn test_placeholders() {
        let id = placeholder("ops@acme");
        assert_eq!(id, "dry-run:ops@acme");
        assert!(is_placeholder(&id));
        assert!(!is_placeholder("4f1c"));
    }

    #[test]
    fn test_is_global() {
        let global = Record::new("r1", serde_json::Map::new());
        assert!(is_global(&global));

        let mut fields = serde_json::Map::new();
        fields.insert("domain_id".into(), Value::String("d1".into()));
        assert!(!is_global(&Record::new("r2", fields)));
    }
}
