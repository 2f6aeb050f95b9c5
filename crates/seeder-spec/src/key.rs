//! Symbolic keys
//!
//! Objects refer to each other by `name@scope` keys instead of remote IDs.
//! A fully qualified key carries one segment per enclosing scope, innermost
//! first:
//!
//! | Kind | Segments |
//! |------|----------|
//! | domain | `<domain>` |
//! | project / user / group / domain role | `<name>@<domain>` |
//! | network / router / address scope / subnet pool / zone | `<name>@<project>@<domain>` |
//! | subnet / port | `<name>@<network>@<project>@<domain>` |

/// Separator between key segments
pub const SEPARATOR: char = '@';

/// Segment counts of fully qualified keys
pub const DOMAIN_SEGMENTS: usize = 1;
pub const PROJECT_SEGMENTS: usize = 2;
pub const NETWORK_SEGMENTS: usize = 3;
pub const SUBNET_SEGMENTS: usize = 4;

pub fn segments(key: &str) -> Vec<&str> {
    key.split(SEPARATOR).collect()
}

pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("@")
}

/// Qualify a relative key with the trailing segments of `scope`
///
/// `scope` lists the enclosing scope innermost first. A key that already has
/// `expected` segments, or that cannot be completed from `scope`, is returned
/// trimmed but otherwise untouched; the validator reports the latter.
///
/// ```
/// use seeder_spec::key::qualify;
///
/// assert_eq!(qualify("sub@net", &["ops", "acme"], 4), "sub@net@ops@acme");
/// assert_eq!(qualify("ext@admin", &["ops", "acme"], 3), "ext@admin@acme");
/// assert_eq!(qualify("ops@acme", &["acme"], 2), "ops@acme");
/// ```
pub fn qualify(key: &str, scope: &[&str], expected: usize) -> String {
    let parts: Vec<String> = key.split(SEPARATOR).map(|s| s.trim().to_string()).collect();
    let have = parts.len();
    if have >= expected {
        return join(&parts);
    }
    let missing = expected - have;
    if missing > scope.len() {
        return join(&parts);
    }
    let mut qualified = parts;
    qualified.extend(scope[scope.len() - missing..].iter().map(|s| s.to_string()));
    join(&qualified)
}

/// Whether `key` has exactly `expected` non-empty segments
pub fn is_qualified(key: &str, expected: usize) -> bool {
    let parts = segments(key);
    parts.len() == expected && parts.iter().all(|p| !p.trim().is_empty())
}

/// The key with its first segment removed (`sub@net@ops@acme` -> `net@ops@acme`)
pub fn parent(key: &str) -> Option<&str> {
    key.split_once(SEPARATOR).map(|(_, rest)| rest)
}

/// First segment of the key
pub fn name(key: &str) -> &str {
    key.split(SEPARATOR).next().unwrap_or(key)
}

/// Lower-case absolute DNS name with a trailing dot
pub fn fqdn(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if name.ends_with('.') {
        name
    } else {
        format!("{}.", name)
    }
}

/// Absolute recordset name within `zone`; `@` denotes the apex
pub fn recordset_fqdn(name: &str, zone: &str) -> String {
    let name = name.trim();
    if name == "@" || name.is_empty() {
        return zone.to_string();
    }
    if name.ends_with('.') {
        return name.to_lowercase();
    }
    format!("{}.{}", name.to_lowercase(), zone)
}
