//! Run-level properties over the full fixture

mod common;

use common::{Harness, Op, spec};
use seeder_cloud::{CloudError, Outcome, Report, ResourceKind};
use seeder_engine::{EngineOptions, Plan, Resolver};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FULL: &str = include_str!("../../seeder-spec/tests/fixtures/full.yaml");

async fn reconcile(harness: &Harness, yaml: &str) -> Report {
    harness
        .engine(EngineOptions::default())
        .reconcile(&CancellationToken::new(), &spec(yaml))
        .await
        .unwrap()
}

fn failures(report: &Report) -> Vec<String> {
    report
        .entries
        .iter()
        .filter(|e| !e.outcome.is_success())
        .map(|e| format!("{} {:?} {:?}", e.key, e.error_kind, e.message))
        .collect()
}

#[tokio::test]
async fn test_full_fixture_converges_then_is_idempotent() {
    let harness = Harness::new();
    let plan = Plan::build(&spec(FULL)).unwrap();

    let first = reconcile(&harness, FULL).await;
    assert!(failures(&first).is_empty(), "{:#?}", failures(&first));
    assert_eq!(first.entries.len(), plan.len());

    harness.fake().clear_calls();
    let second = reconcile(&harness, FULL).await;
    assert!(failures(&second).is_empty(), "{:#?}", failures(&second));
    let changed: Vec<&str> = second
        .entries
        .iter()
        .filter(|e| e.outcome != Outcome::Unchanged)
        .map(|e| e.key.as_str())
        .collect();
    assert!(changed.is_empty(), "second run changed {:?}", changed);
    assert_eq!(harness.fake().writes(), 0);
}

#[tokio::test]
async fn test_no_revocations_without_exclusive_sets() {
    let harness = Harness::new();
    reconcile(&harness, FULL).await;

    // alice and bob are in admins; a third member added by hand stays
    let group = harness.fake().find(ResourceKind::Group, "name", "admins").unwrap();
    harness.fake().seed(
        ResourceKind::GroupMembership,
        json!({"group_id": group.id, "user_id": "carol"}),
    );

    let report = reconcile(&harness, FULL).await;
    assert_eq!(harness.fake().count(Op::Revoke), 0);
    assert_eq!(
        report.entry("group-membership:admins@acme").unwrap().outcome,
        Outcome::Unchanged
    );
    assert_eq!(harness.fake().objects(ResourceKind::GroupMembership).len(), 3);
}

#[tokio::test]
async fn test_exclusive_access_list_revokes_strangers() {
    let harness = Harness::new();
    reconcile(&harness, FULL).await;

    let flavor = harness.fake().find(ResourceKind::Flavor, "name", "gpu.large").unwrap();
    harness.fake().seed(
        ResourceKind::FlavorAccess,
        json!({"resource_id": flavor.id, "project_id": "stranger"}),
    );

    let report = reconcile(&harness, FULL).await;
    let entry = report.entry("flavor-access:gpu.large").unwrap();
    assert_eq!(entry.outcome, Outcome::Updated);
    assert_eq!(entry.detail.as_deref(), Some("removed stranger"));
    assert_eq!(harness.fake().count_of(Op::Revoke, ResourceKind::FlavorAccess), 1);

    let remaining = harness.fake().objects(ResourceKind::FlavorAccess);
    assert_eq!(remaining.len(), 1);
    let ml = harness.fake().find(ResourceKind::Project, "name", "ml").unwrap();
    assert_eq!(remaining[0].str("project_id"), Some(ml.id.as_str()));
}

/// Remote fields the spec does not name are neither compared nor touched
#[tokio::test]
async fn test_unnamed_fields_are_left_alone() {
    let harness = Harness::new();
    reconcile(&harness, FULL).await;

    let bob = harness.fake().find(ResourceKind::User, "name", "bob").unwrap();
    harness
        .fake()
        .set_field(ResourceKind::User, &bob.id, "email", json!("bob@elsewhere.example"));
    let nova = harness.fake().find(ResourceKind::Service, "name", "nova").unwrap();
    harness
        .fake()
        .set_field(ResourceKind::Service, &nova.id, "description", json!("set by hand"));

    let report = reconcile(&harness, FULL).await;
    assert_eq!(report.entry("user:bob@acme").unwrap().outcome, Outcome::Unchanged);
    assert_eq!(report.entry("service:nova").unwrap().outcome, Outcome::Unchanged);
    let bob = harness.fake().find(ResourceKind::User, "name", "bob").unwrap();
    assert_eq!(bob.str("email"), Some("bob@elsewhere.example"));
}

/// No object is written before everything it references
#[tokio::test]
async fn test_dependencies_are_created_first() {
    let harness = Harness::new();
    reconcile(&harness, FULL).await;

    let calls = harness.fake().calls();
    let first_create = |kind: ResourceKind| {
        calls
            .iter()
            .position(|c| c.op == Op::Create && c.kind == kind)
            .unwrap_or_else(|| panic!("no create of {}", kind))
    };
    let order = [
        (ResourceKind::Domain, ResourceKind::Project),
        (ResourceKind::Domain, ResourceKind::User),
        (ResourceKind::Project, ResourceKind::Network),
        (ResourceKind::Network, ResourceKind::Subnet),
        (ResourceKind::Subnet, ResourceKind::Port),
        (ResourceKind::Subnet, ResourceKind::RouterInterface),
        (ResourceKind::AddressScope, ResourceKind::SubnetPool),
        (ResourceKind::Zone, ResourceKind::Recordset),
        (ResourceKind::Zone, ResourceKind::TsigKey),
        (ResourceKind::Region, ResourceKind::Endpoint),
        (ResourceKind::Service, ResourceKind::Endpoint),
        (ResourceKind::Flavor, ResourceKind::FlavorAccess),
        (ResourceKind::Role, ResourceKind::RoleAssignment),
        (ResourceKind::Role, ResourceKind::RoleInference),
        (ResourceKind::Group, ResourceKind::GroupMembership),
    ];
    for (before, after) in order {
        assert!(
            first_create(before) < first_create(after),
            "{} created after {}",
            before,
            after
        );
    }
}

/// Every id the resolver hands out is the id of a live object
#[tokio::test]
async fn test_cache_matches_backend_after_run() {
    let harness = Harness::new();
    let resolver = Arc::new(Resolver::new(harness.cloud.clone()));
    harness
        .engine(EngineOptions::default())
        .run(&CancellationToken::new(), &spec(FULL), resolver.clone())
        .await
        .unwrap();

    for (kind, field, name, key) in [
        (ResourceKind::Domain, "name", "acme", "acme"),
        (ResourceKind::Project, "name", "ml", "ml@acme"),
        (ResourceKind::Network, "name", "public", "public@admin@Default"),
        (ResourceKind::Subnet, "name", "private-v4", "private-v4@private@ops@acme"),
        (ResourceKind::Zone, "name", "ops.acme.example.", "ops.acme.example.@ops@acme"),
        (ResourceKind::Role, "name", "auditor", "auditor@acme"),
    ] {
        let live = harness.fake().find(kind, field, name).unwrap();
        assert_eq!(resolver.cached(kind, key).await, Some(live.id), "{} {}", kind, key);
    }
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let harness = Harness::new();
    let report = harness
        .dry_run()
        .reconcile(&CancellationToken::new(), &spec(FULL))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(failures(&report).is_empty(), "{:#?}", failures(&report));
    assert_eq!(harness.fake().writes(), 0);
    assert_eq!(harness.fake().count(Op::Revoke), 0);
    assert!(report.entry("router:edge@ops@acme").unwrap().id.as_deref().is_some_and(
        |id| id.starts_with("dry-run:")
    ));
}

#[tokio::test]
async fn test_dry_run_reports_drift_without_fixing_it() {
    let harness = Harness::new();
    reconcile(&harness, FULL).await;
    let ops = harness.fake().find(ResourceKind::Project, "name", "ops").unwrap();
    harness
        .fake()
        .set_field(ResourceKind::Project, &ops.id, "description", json!("drifted"));
    harness.fake().clear_calls();

    let report = harness
        .dry_run()
        .reconcile(&CancellationToken::new(), &spec(FULL))
        .await
        .unwrap();

    let entry = report.entry("project:ops@acme").unwrap();
    assert_eq!(entry.outcome, Outcome::Updated);
    assert_eq!(entry.detail.as_deref(), Some("patched: description"));
    assert_eq!(harness.fake().writes(), 0);
}

/// A router whose interface attach fails resumes on the next run
#[tokio::test]
async fn test_router_resumes_after_partial_failure() {
    let harness = Harness::new();
    harness.fake().fail(
        Op::Create,
        ResourceKind::RouterInterface,
        1,
        CloudError::Forbidden("policy does not allow add_router_interface".into()),
    );

    let first = reconcile(&harness, FULL).await;
    let entry = first.entry("router:edge@ops@acme").unwrap();
    assert_eq!(entry.outcome, Outcome::Failed);
    assert_eq!(
        entry.detail.as_deref(),
        Some("router left in state present-gw-only")
    );
    let router = harness.fake().find(ResourceKind::Router, "name", "edge").unwrap();
    assert!(router.get("external_gateway_info").is_some());

    let second = reconcile(&harness, FULL).await;
    let entry = second.entry("router:edge@ops@acme").unwrap();
    assert_eq!(entry.outcome, Outcome::Updated);
    assert_eq!(
        entry.detail.as_deref(),
        Some("interface private-v4@private@ops@acme")
    );
    assert_eq!(harness.fake().objects(ResourceKind::RouterInterface).len(), 1);
}

/// A quota key set to zero is enforced, not dropped
#[tokio::test]
async fn test_zero_quota_is_written() {
    let harness = Harness::new();
    let yaml = r#"
openstack:
  domains:
    - name: acme
      projects:
        - name: ops
          compute_quota: {instances: 0, cores: -1}
"#;
    let report = reconcile(&harness, yaml).await;
    assert_eq!(
        report.entry("compute-quota:ops@acme").unwrap().outcome,
        Outcome::Updated
    );
    let ops = harness.fake().find(ResourceKind::Project, "name", "ops").unwrap();
    let quota = harness
        .fake()
        .find(ResourceKind::ComputeQuota, "project_id", &ops.id)
        .unwrap();
    assert_eq!(quota.get("instances"), Some(&json!(0)));
    assert_eq!(quota.get("cores"), Some(&json!(-1)));
    assert_eq!(quota.get("ram"), Some(&json!(51200)));
}
