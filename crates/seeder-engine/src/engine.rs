//! Engine entry point
//!
//! One call converges the cloud toward one spec document and returns the
//! run report. Per-object failures land in the report; only conditions that
//! prevent a run at all come back as errors.

use crate::error::{EngineError, Result};
use crate::plan::Plan;
use crate::reconcile::Context;
use crate::resolver::Resolver;
use crate::scheduler::Scheduler;
use seeder_cloud::{CloudApi, Report};
use seeder_spec::SpecDocument;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Run tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reconcilers in flight at once
    pub concurrency: usize,
    /// Whole-run deadline
    pub run_timeout: Duration,
    /// Observe and diff only
    pub dry_run: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            dry_run: false,
        }
    }
}

pub struct Engine {
    cloud: Arc<dyn CloudApi>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(cloud: Arc<dyn CloudApi>, options: EngineOptions) -> Self {
        Self { cloud, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Authenticate, then converge toward `spec`
    pub async fn reconcile(&self, cancel: &CancellationToken, spec: &SpecDocument) -> Result<Report> {
        let auth = self.cloud.check_auth().await?;
        if !auth.authenticated {
            let reason = auth.error.unwrap_or_else(|| "credentials rejected".to_string());
            warn!(cloud = self.cloud.name(), reason = %reason, "Authentication failed");
            return Err(EngineError::AuthFailed(reason));
        }
        if let Some(account) = &auth.account_info {
            info!(cloud = self.cloud.name(), account = %account, "Authenticated");
        }

        let resolver = Arc::new(Resolver::new(self.cloud.clone()));
        self.run(cancel, spec, resolver).await
    }

    /// Converge with a caller-provided resolver, skipping the auth probe
    #[instrument(skip_all, fields(cloud = self.cloud.name(), dry_run = self.options.dry_run))]
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        spec: &SpecDocument,
        resolver: Arc<Resolver>,
    ) -> Result<Report> {
        let started = Instant::now();
        let plan = Plan::build(spec)?;
        info!(tasks = plan.len(), concurrency = self.options.concurrency, "Plan built");

        let ctx = Context::new(self.cloud.clone(), resolver, self.options.dry_run);
        let mut report = Report::new(self.options.dry_run);
        Scheduler::new(self.options.concurrency, self.options.run_timeout)
            .run(&plan, &ctx, cancel, &mut report)
            .await;

        report.duration_ms = started.elapsed().as_millis() as u64;
        report.sort();
        let summary = report.summary();
        if report.is_success() {
            info!(%summary, duration_ms = report.duration_ms, "Reconciliation finished");
        } else {
            warn!(
                %summary,
                pending = report.pending,
                cancelled = report.cancelled,
                timed_out = report.timed_out,
                duration_ms = report.duration_ms,
                "Reconciliation finished with problems"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.run_timeout, Duration::from_secs(900));
        assert!(!options.dry_run);
    }
}
