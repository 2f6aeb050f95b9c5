//! Next-page discovery for the pagination styles used across services

use serde_json::Value;

/// URL of the next page, if the response body announces one
///
/// Two styles exist:
/// - keystone and designate: `"links": {"next": "<url>" | null}`
/// - neutron, nova, cinder, manila: `"<collection>_links": [{"rel": "next", "href": "<url>"}]`
pub fn next_link(body: &Value, collection: &str) -> Option<String> {
    if let Some(next) = body
        .get("links")
        .and_then(|links| links.get("next"))
        .and_then(Value::as_str)
        && !next.is_empty()
    {
        return Some(next.to_string());
    }

    body.get(format!("{}_links", collection))
        .and_then(Value::as_array)?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Resolve a next link that may be relative to the service root
pub fn absolute(root: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }
    // Relative links carry the path from the host onward
    let host_end = root
        .find("://")
        .and_then(|scheme| root[scheme + 3..].find('/').map(|i| scheme + 3 + i))
        .unwrap_or(root.len());
    format!("{}/{}", &root[..host_end], link.trim_start_matches('/'))
}

/// Marker for the next page of a swift listing: the last name returned
pub fn swift_marker(page: &[Value]) -> Option<String> {
    page.last()
        .and_then(|entry| entry.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
