//! Loader integration tests

use seeder_cloud::ErrorKind;
use seeder_spec::{
    Interface, ScopeKind, SpecError, TsigScope, Visibility, dump_canonical, load_spec_file,
    load_spec_str,
};
use std::fs;
use tempfile::TempDir;

const FULL: &str = include_str!("fixtures/full.yaml");

#[test]
fn test_full_fixture_loads_and_normalises() {
    let doc = load_spec_str(FULL).unwrap();

    let nova = &doc.services[0];
    assert_eq!(nova.name, "nova");
    assert_eq!(nova.service_type, "compute");
    assert_eq!(nova.endpoints[1].interface, Interface::Internal);

    assert_eq!(doc.traits, vec!["CUSTOM_RAID5"]);
    assert_eq!(doc.flavors[0].extra_specs["hw:numa_nodes"], "1");
    assert_eq!(doc.flavors[1].visibility, Visibility::Private);

    let acme = doc.domain("acme").unwrap();
    assert_eq!(acme.groups[0].users, vec!["alice@acme", "bob@acme"]);
    assert_eq!(
        acme.users[0].role_assignments[0].role,
        "auditor@acme",
        "bare name of a domain role is qualified"
    );

    let ops = doc.project("ops@acme").unwrap();
    let inherited = &ops.role_assignments[1];
    assert!(inherited.inherited);
    assert_eq!(inherited.group.as_deref(), Some("admins@acme"));
    assert_eq!(
        ops.routers[0].interfaces[0].subnet,
        "private-v4@private@ops@acme"
    );
    assert_eq!(
        ops.networks[0].subnets[1].subnet_pool.as_deref(),
        Some("pool-v4@ops@acme")
    );

    let zone = &ops.dns_zones[0];
    assert_eq!(zone.name, "ops.acme.example.");
    assert_eq!(zone.recordsets[0].name, "www.ops.acme.example.");
    assert_eq!(zone.recordsets[0].records, vec!["192.0.2.10", "192.0.2.11"]);
    assert_eq!(zone.recordsets[1].name, "ops.acme.example.");
    assert_eq!(ops.dns_tsigkeys[0].scope, TsigScope::Zone);

    let ml = doc.project("ml@acme").unwrap();
    assert_eq!(ml.parent.as_deref(), Some("ops@acme"));

    let domain_assignment = &acme.role_assignments[0];
    assert_eq!(domain_assignment.scope().unwrap().kind, ScopeKind::Domain);
}

#[test]
fn test_load_dump_load_round_trip() {
    let first = load_spec_str(FULL).unwrap();
    let dumped = dump_canonical(&first).unwrap();
    let second = load_spec_str(&dumped).unwrap();
    assert_eq!(first, second);

    // canonical form is a fixed point
    assert_eq!(dump_canonical(&second).unwrap(), dumped);
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("seed.yaml");
    fs::write(&path, FULL).unwrap();

    let doc = load_spec_file(&path).unwrap();
    assert_eq!(doc.domains.len(), 2);
}

#[test]
fn test_unknown_nested_field() {
    let yaml = r#"
openstack:
  domains:
    - name: acme
      projects:
        - name: ops
          networks:
            - name: net
              vlan: 12
"#;
    let err = load_spec_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpecUnknownField);
    assert!(err.to_string().contains("vlan"));
}

#[test]
fn test_unknown_root_key() {
    let err = load_spec_str("openstack: {}\nextra: 1\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpecUnknownField);
}

#[test]
fn test_syntax_error_is_malformed() {
    let err = load_spec_str("openstack:\n  domains: [\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpecMalformed);
}

#[test]
fn test_bad_enum_is_malformed() {
    let yaml = r#"
openstack:
  services:
    - name: nova
      type: compute
      endpoints:
        - {region: r1, interface: private, url: "https://x"}
"#;
    let err = load_spec_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpecMalformed);
}

#[test]
fn test_validation_collects_all_problems() {
    let yaml = r#"
openstack:
  domains:
    - name: acme
      users:
        - name: alice
        - name: alice
      projects:
        - name: ops
          compute_quota: {cores: -5}
          routers:
            - name: r1
              interfaces:
                - {subnet: lonely}
"#;
    let err = load_spec_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpecValidation);
    let SpecError::Validation(problems) = err else {
        panic!("expected validation error");
    };
    assert_eq!(problems.len(), 3, "{:#?}", problems);
    assert!(problems.iter().any(|p| p.contains("duplicate user 'alice'")));
    assert!(problems.iter().any(|p| p.contains("compute_quota.cores")));
    assert!(problems.iter().any(|p| p.contains("lonely")));
}

#[test]
fn test_empty_collections_are_absent() {
    let with_empty = load_spec_str("openstack:\n  roles: []\n  domains: []\n").unwrap();
    let without = load_spec_str("openstack: {}\n").unwrap();
    assert_eq!(with_empty, without);
    assert!(without.is_empty());
}
