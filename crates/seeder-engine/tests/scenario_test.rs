//! End-to-end runs against the in-memory cloud

mod common;

use common::{FakeCloud, Harness, Op, spec};
use seeder_cloud::{CloudError, ErrorKind, Outcome, ResourceKind};
use seeder_engine::{EngineOptions, Resolver};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FRESH: &str = r#"
openstack:
  roles:
    - name: admin
  domains:
    - name: acme
      enabled: true
      users:
        - name: alice
      projects:
        - name: ops
          description: Operations
          role_assignments:
            - {user: alice, role: admin}
"#;

const ASSIGNMENT: &str = "role-assignment:user=alice@acme role=admin project=ops@acme";

fn outcome_of(report: &seeder_cloud::Report, key: &str) -> Outcome {
    report
        .entry(key)
        .unwrap_or_else(|| panic!("no report entry for {}", key))
        .outcome
}

async fn converged(harness: &Harness) {
    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(FRESH))
        .await
        .unwrap();
    assert!(report.is_success());
    harness.fake().clear_calls();
}

/// An empty cloud gets every object created and every id cached
#[tokio::test]
async fn test_fresh_cloud() {
    let harness = Harness::new();
    let resolver = Arc::new(Resolver::new(harness.cloud.clone()));

    let report = harness
        .engine(EngineOptions::default())
        .run(&CancellationToken::new(), &spec(FRESH), resolver.clone())
        .await
        .unwrap();

    let summary = report.summary();
    assert_eq!(summary.created, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(report.exit_code(), 0);

    let assignment_key = ASSIGNMENT.trim_start_matches("role-assignment:");
    for (kind, key) in [
        (ResourceKind::Domain, "acme"),
        (ResourceKind::Project, "ops@acme"),
        (ResourceKind::User, "alice@acme"),
        (ResourceKind::Role, "admin"),
        (ResourceKind::RoleAssignment, assignment_key),
    ] {
        assert!(resolver.contains(kind, key).await, "{} {} not cached", kind, key);
    }

    let project = harness.fake().find(ResourceKind::Project, "name", "ops").unwrap();
    assert_eq!(
        resolver.cached(ResourceKind::Project, "ops@acme").await,
        Some(project.id)
    );
}

/// Re-running a converged spec writes nothing
#[tokio::test]
async fn test_converged_cloud() {
    let harness = Harness::new();
    converged(&harness).await;

    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(FRESH))
        .await
        .unwrap();

    assert_eq!(report.summary().unchanged, 5);
    assert_eq!(harness.fake().writes(), 0);
}

/// Only the drifted field is patched
#[tokio::test]
async fn test_partial_drift() {
    let harness = Harness::new();
    converged(&harness).await;
    let project = harness.fake().find(ResourceKind::Project, "name", "ops").unwrap();
    harness.fake().set_field(
        ResourceKind::Project,
        &project.id,
        "description",
        json!("changed by hand"),
    );

    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(FRESH))
        .await
        .unwrap();

    let entry = report.entry("project:ops@acme").unwrap();
    assert_eq!(entry.outcome, Outcome::Updated);
    assert_eq!(entry.detail.as_deref(), Some("patched: description"));
    assert_eq!(report.summary().unchanged, 4);
    assert_eq!(harness.fake().count_of(Op::Update, ResourceKind::Project), 1);

    let project = harness.fake().find(ResourceKind::Project, "name", "ops").unwrap();
    assert_eq!(project.str("description"), Some("Operations"));
}

/// A role neither declared nor present fails only the assignment
#[tokio::test]
async fn test_unresolved_reference() {
    let harness = Harness::new();
    let yaml = FRESH.replace("role: admin}", "role: viewer}");

    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(&yaml))
        .await
        .unwrap();

    let entry = report
        .entry("role-assignment:user=alice@acme role=viewer project=ops@acme")
        .unwrap();
    assert_eq!(entry.outcome, Outcome::Failed);
    assert_eq!(entry.error_kind, Some(ErrorKind::UnresolvedReference));
    assert_eq!(outcome_of(&report, "user:alice@acme"), Outcome::Created);
    assert_eq!(outcome_of(&report, "project:ops@acme"), Outcome::Created);
    assert_eq!(
        harness.fake().count_of(Op::Create, ResourceKind::RoleAssignment),
        0
    );
    assert!(harness.fake().find(ResourceKind::Role, "name", "viewer").is_none());
    assert_eq!(report.exit_code(), 1);
}

/// Two 503s on a quota write are retried with backoff
#[tokio::test(start_paused = true)]
async fn test_server_flake() {
    let harness = Harness::new();
    let yaml = FRESH.replace(
        "          description: Operations\n",
        "          description: Operations\n          compute_quota: {cores: 40}\n",
    );
    harness.fake().fail(
        Op::Update,
        ResourceKind::ComputeQuota,
        2,
        CloudError::ServerError {
            status: 503,
            message: "Service Unavailable".into(),
        },
    );

    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(&yaml))
        .await
        .unwrap();

    assert_eq!(outcome_of(&report, "compute-quota:ops@acme"), Outcome::Updated);
    let attempts: Vec<_> = harness
        .fake()
        .calls()
        .into_iter()
        .filter(|c| c.op == Op::Update && c.kind == ResourceKind::ComputeQuota)
        .collect();
    assert_eq!(attempts.len(), 3);

    let retry = &harness.cloud.config().retry;
    for (n, pair) in attempts.windows(2).enumerate() {
        let waited = pair[1].at - pair[0].at;
        assert!(
            waited >= retry.min_delay(n as u32),
            "retry {} waited {:?}",
            n,
            waited
        );
    }

    let project = harness.fake().find(ResourceKind::Project, "name", "ops").unwrap();
    let quota = harness
        .fake()
        .find(ResourceKind::ComputeQuota, "project_id", &project.id)
        .unwrap();
    assert_eq!(quota.get("cores"), Some(&json!(40)));
}

/// A failed domain skips everything beneath it
#[tokio::test]
async fn test_dependency_failure() {
    let harness = Harness::new();
    let yaml = r#"
openstack:
  domains:
    - name: acme
      roles:
        - name: admin
      users:
        - name: alice
      projects:
        - name: ops
          role_assignments:
            - {user: alice, role: admin}
"#;
    harness.fake().fail_matching(
        Op::Create,
        ResourceKind::Domain,
        "name",
        "acme",
        CloudError::Forbidden("You are not authorized".into()),
    );

    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(yaml))
        .await
        .unwrap();

    let domain = report.entry("domain:acme").unwrap();
    assert_eq!(domain.outcome, Outcome::Failed);
    assert_eq!(domain.error_kind, Some(ErrorKind::Forbidden));

    let skipped = report.entries_by_outcome(Outcome::SkippedDependencyFailed);
    let mut keys: Vec<&str> = skipped.iter().map(|e| e.key.as_str()).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "project:ops@acme",
            "role-assignment:user=alice@acme role=admin@acme project=ops@acme",
            "role:admin@acme",
            "user:alice@acme",
        ]
    );
    assert!(
        skipped
            .iter()
            .all(|e| e.message.as_deref() == Some("dependency domain:acme did not converge"))
    );
    assert_eq!(report.exit_code(), 1);
    assert_eq!(harness.fake().count_of(Op::Create, ResourceKind::Project), 0);
}

#[tokio::test]
async fn test_rejected_credentials_stop_before_planning() {
    let harness = Harness::new();
    harness.fake().reject_credentials();

    let err = harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(FRESH))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(harness.fake().calls().is_empty());
}

#[tokio::test]
async fn test_expired_token_mid_run_stops_dispatch() {
    let harness = Harness::new();
    harness.fake().fail(
        Op::List,
        ResourceKind::Role,
        1,
        CloudError::AuthenticationFailed("token expired".into()),
    );

    let report = harness
        .engine(EngineOptions {
            concurrency: 1,
            ..EngineOptions::default()
        })
        .reconcile(&CancellationToken::new(), &spec(FRESH))
        .await
        .unwrap();

    assert!(report.auth_failed);
    assert_eq!(report.exit_code(), 3);
    // the role failed and its assignment was skipped; nothing else started
    assert_eq!(report.entries.len(), 2);
    assert_eq!(
        report.entry(ASSIGNMENT).unwrap().outcome,
        Outcome::SkippedDependencyFailed
    );
    assert_eq!(report.pending, 3);
}

#[tokio::test]
async fn test_cancelled_before_start_reports_everything_pending() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = harness
        .engine(EngineOptions::default())
        .reconcile(&cancel, &spec(FRESH))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.entries.is_empty());
    assert_eq!(report.pending, 5);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(harness.fake().writes(), 0);
}

/// In-flight work finishes after the deadline; nothing new starts
#[tokio::test(start_paused = true)]
async fn test_run_deadline_drains_in_flight_work() {
    let harness = Harness::new();
    harness.fake().set_latency(std::time::Duration::from_secs(10));

    let report = harness
        .engine(EngineOptions {
            concurrency: 1,
            run_timeout: std::time::Duration::from_secs(1),
            dry_run: false,
        })
        .reconcile(&CancellationToken::new(), &spec(FRESH))
        .await
        .unwrap();

    assert!(report.timed_out);
    assert_eq!(report.exit_code(), 4);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].key, "role:admin");
    assert_eq!(report.entries[0].outcome, Outcome::Created);
    assert_eq!(report.pending, 4);
}

#[tokio::test]
async fn test_fake_rejects_duplicate_create() {
    let fake = FakeCloud::new();
    fake.seed(ResourceKind::Domain, json!({"name": "acme"}));
    let err = seeder_cloud::CloudApi::create(&fake, ResourceKind::Domain, &json!({"name": "acme"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
