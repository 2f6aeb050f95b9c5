//! Retry, deadline and concurrency guard around any `CloudApi`
//!
//! The guard is where the call contracts live so that the HTTP client and
//! in-memory doubles behave the same way under failure:
//!
//! - transient failures (network, 5xx, timeout) are retried with jittered
//!   exponential backoff, bounded by attempts and total elapsed time
//! - 409 is retried only for quota-set writes
//! - a create rejected with 409 is absorbed when exactly one object matches
//!   the payload's unique fields
//! - every call holds a permit of its service's semaphore and is cut off at
//!   the per-call deadline

use crate::error::{CloudError, ErrorKind, Result};
use crate::kind::{ResourceKind, ServiceType};
use crate::provider::{AuthStatus, CloudApi, Filter, GuardConfig, Record};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Write,
}

/// `CloudApi` wrapper enforcing retry, timeout and concurrency contracts
pub struct Guarded<C> {
    inner: C,
    config: GuardConfig,
    limits: HashMap<ServiceType, Arc<Semaphore>>,
}

impl<C: CloudApi> Guarded<C> {
    pub fn new(inner: C, config: GuardConfig) -> Self {
        let limits = ServiceType::ALL
            .iter()
            .map(|service| {
                let permits = config
                    .service_overrides
                    .get(service)
                    .copied()
                    .unwrap_or(config.per_service_concurrency)
                    .max(1);
                (*service, Arc::new(Semaphore::new(permits)))
            })
            .collect();
        Self {
            inner,
            config,
            limits,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let retry = &self.config.retry;
        let base = retry.base_delay(attempt).as_secs_f64();
        let factor = if retry.jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - retry.jitter)..=(1.0 + retry.jitter))
        } else {
            1.0
        };
        Duration::from_secs_f64(base * factor)
    }

    fn should_retry(&self, kind: ResourceKind, call: CallKind, error: &CloudError) -> bool {
        match error.kind() {
            ErrorKind::Conflict => call == CallKind::Write && kind.is_quota(),
            other => other.is_transient(),
        }
    }

    async fn call<T, F, Fut>(
        &self,
        kind: ResourceKind,
        call: CallKind,
        operation: &str,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let limit = self
            .limits
            .get(&kind.service())
            .cloned()
            .unwrap_or_else(|| Arc::new(Semaphore::new(1)));
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = {
                let _permit = limit
                    .acquire()
                    .await
                    .map_err(|_| CloudError::Network("concurrency limiter closed".to_string()))?;
                match tokio::time::timeout(self.config.call_timeout, f()).await {
                    Ok(result) => result,
                    Err(_) => Err(CloudError::Timeout(format!(
                        "{} {} exceeded {:?}",
                        operation, kind, self.config.call_timeout
                    ))),
                }
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.should_retry(kind, call, &error) || attempt >= self.config.retry.max_attempts
            {
                return Err(error);
            }

            let delay = self.jittered(attempt - 1);
            if started.elapsed() + delay > self.config.retry.max_elapsed {
                warn!(
                    operation = operation,
                    kind = %kind,
                    attempt = attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(error);
            }

            warn!(
                operation = operation,
                kind = %kind,
                attempt = attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Backend call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl<C: CloudApi> CloudApi for Guarded<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        self.inner.check_auth().await
    }

    async fn list(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>> {
        self.call(kind, CallKind::Read, "list", || self.inner.list(kind, filter))
            .await
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<Record>> {
        self.call(kind, CallKind::Read, "get", || self.inner.get(kind, id))
            .await
    }

    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Record> {
        let created = self
            .call(kind, CallKind::Write, "create", || {
                self.inner.create(kind, payload)
            })
            .await;

        let message = match created {
            Err(CloudError::Conflict(message)) => message,
            other => return other,
        };

        // Someone else created it between our list and create
        let Some(filter) = kind.unique_filter(payload) else {
            return Err(CloudError::Conflict(message));
        };
        let mut found = self.list(kind, &filter).await?;
        if found.len() == 1 {
            debug!(kind = %kind, filter = %filter, "Absorbed create conflict");
            if let Some(record) = found.pop() {
                return Ok(record);
            }
        }
        Err(CloudError::Conflict(message))
    }

    async fn update(&self, kind: ResourceKind, id: &str, patch: &Value) -> Result<Record> {
        self.call(kind, CallKind::Write, "update", || {
            self.inner.update(kind, id, patch)
        })
        .await
    }

    async fn revoke(&self, kind: ResourceKind, payload: &Value) -> Result<()> {
        self.call(kind, CallKind::Write, "revoke", || {
            self.inner.revoke(kind, payload)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend that replays scripted results and records call instants
    #[derive(Default)]
    struct Scripted {
        results: Mutex<VecDeque<Result<Record>>>,
        existing: Mutex<Vec<Record>>,
        calls: Mutex<Vec<Instant>>,
        lists: AtomicU32,
        hang: bool,
    }

    impl Scripted {
        fn with(results: Vec<Result<Record>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Default::default()
            }
        }

        fn next(&self) -> Result<Record> {
            self.calls.lock().unwrap().push(Instant::now());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(record("r1")))
        }

        fn attempts(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    fn record(id: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("id".into(), json!(id));
        fields.insert("name".into(), json!("ops"));
        Record::new(id, fields)
    }

    #[async_trait]
    impl CloudApi for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn check_auth(&self) -> Result<AuthStatus> {
            Ok(AuthStatus::ok("test"))
        }

        async fn list(&self, _kind: ResourceKind, filter: &Filter) -> Result<Vec<Record>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .existing
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.matches(filter))
                .cloned()
                .collect())
        }

        async fn get(&self, _kind: ResourceKind, _id: &str) -> Result<Option<Record>> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
            self.next().map(Some)
        }

        async fn create(&self, _kind: ResourceKind, _payload: &Value) -> Result<Record> {
            self.next()
        }

        async fn update(&self, _kind: ResourceKind, _id: &str, _patch: &Value) -> Result<Record> {
            self.next()
        }

        async fn revoke(&self, _kind: ResourceKind, _payload: &Value) -> Result<()> {
            self.next().map(|_| ())
        }
    }

    fn server_error() -> CloudError {
        CloudError::from_status(503, "unavailable")
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_write_retries_server_errors_with_backoff() {
        let backend = Scripted::with(vec![Err(server_error()), Err(server_error())]);
        let guard = Guarded::new(backend, GuardConfig::default());

        let result = guard
            .update(ResourceKind::ComputeQuota, "p1", &json!({"cores": 10}))
            .await;
        assert!(result.is_ok());

        let calls = guard.inner().calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        let retry = &guard.config().retry;
        assert!(calls[1] - calls[0] >= retry.min_delay(0));
        assert!(calls[2] - calls[1] >= retry.min_delay(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let backend = Scripted::with((0..10).map(|_| Err(server_error())).collect());
        let guard = Guarded::new(backend, GuardConfig::default());

        let err = guard
            .update(ResourceKind::Project, "p1", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(guard.inner().attempts(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let backend = Scripted::with(vec![Err(CloudError::from_status(403, "denied"))]);
        let guard = Guarded::new(backend, GuardConfig::default());

        let err = guard
            .update(ResourceKind::Project, "p1", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(guard.inner().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_status_is_not_retried() {
        let backend = Scripted::with(
            (0..5)
                .map(|_| Err(CloudError::from_status(408, "slow client")))
                .collect(),
        );
        let guard = Guarded::new(backend, GuardConfig::default());

        let err = guard.get(ResourceKind::Domain, "d1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(guard.inner().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_retried_only_for_quota() {
        let backend = Scripted::with(vec![Err(CloudError::Conflict("busy".into()))]);
        let guard = Guarded::new(backend, GuardConfig::default());
        assert!(guard
            .update(ResourceKind::NetworkQuota, "p1", &json!({"network": 5}))
            .await
            .is_ok());
        assert_eq!(guard.inner().attempts(), 2);

        let backend = Scripted::with(vec![Err(CloudError::Conflict("busy".into()))]);
        let guard = Guarded::new(backend, GuardConfig::default());
        let err = guard
            .update(ResourceKind::Network, "n1", &json!({"mtu": 1400}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(guard.inner().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_conflict_absorbed_by_unique_match() {
        let backend = Scripted::with(vec![Err(CloudError::Conflict("exists".into()))]);
        backend.existing.lock().unwrap().push(record("p9"));
        let guard = Guarded::new(backend, GuardConfig::default());

        let created = guard
            .create(ResourceKind::Domain, &json!({"name": "ops"}))
            .await
            .unwrap();
        assert_eq!(created.id, "p9");
        assert_eq!(guard.inner().lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_conflict_without_match_fails() {
        let backend = Scripted::with(vec![Err(CloudError::Conflict("exists".into()))]);
        let guard = Guarded::new(backend, GuardConfig::default());

        let err = guard
            .create(ResourceKind::Domain, &json!({"name": "ops"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_auth_check_is_not_guarded() {
        let guard = Guarded::new(Scripted::default(), GuardConfig::default());
        let status = tokio_test::block_on(guard.check_auth()).unwrap();
        assert!(status.authenticated);
        assert_eq!(guard.name(), "scripted");
        assert_eq!(guard.inner().attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_deadline_yields_timeout() {
        let backend = Scripted {
            hang: true,
            ..Default::default()
        };
        let guard = Guarded::new(backend, GuardConfig::default());

        let err = guard.get(ResourceKind::Domain, "d1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
