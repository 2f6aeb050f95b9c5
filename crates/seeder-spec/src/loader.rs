//! Spec loader
//!
//! bytes -> YAML tree (duplicate keys rejected) -> typed records (unknown
//! keys rejected) -> normalise -> validate

use crate::error::{Result, SpecError};
use crate::model::{SpecDocument, SpecFile};
use crate::normalize::normalize;
use crate::validate::validate;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Load a spec from raw bytes
pub fn load_spec(bytes: &[u8]) -> Result<SpecDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SpecError::Malformed(format!("spec is not valid UTF-8: {}", e)))?;
    load_spec_str(text)
}

/// Load a spec from a YAML string
pub fn load_spec_str(text: &str) -> Result<SpecDocument> {
    // 1. Untyped parse; mappings reject duplicate keys at every level
    debug!("Step 1: Parsing YAML");
    serde_yaml::from_str::<serde_yaml::Value>(text)
        .map_err(|e| SpecError::Malformed(e.to_string()))?;

    // 2. Typed parse
    debug!("Step 2: Decoding records");
    let file: SpecFile = serde_yaml::from_str(text).map_err(classify)?;
    let mut doc = file.openstack;

    // 3. Canonical identifiers
    debug!("Step 3: Normalising");
    normalize(&mut doc);

    // 4. Structural and cross-reference checks
    debug!("Step 4: Validating");
    let problems = validate(&doc);
    if !problems.is_empty() {
        warn!(problems = problems.len(), "Spec rejected");
        return Err(SpecError::Validation(problems));
    }

    info!(
        domains = doc.domains.len(),
        projects = doc.domains.iter().map(|d| d.projects.len()).sum::<usize>(),
        services = doc.services.len(),
        flavors = doc.flavors.len(),
        "Spec loaded successfully"
    );
    Ok(doc)
}

/// Load a spec file from disk
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_spec_file(path: impl AsRef<Path>) -> Result<SpecDocument> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SpecError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!(size = bytes.len(), "Read spec file");
    load_spec(&bytes)
}

/// Render a normalised document in canonical YAML form
///
/// Loading the output yields a document equal to `doc`.
pub fn dump_canonical(doc: &SpecDocument) -> Result<String> {
    let file = SpecFile {
        openstack: doc.clone(),
    };
    serde_yaml::to_string(&file).map_err(|e| SpecError::Malformed(e.to_string()))
}

fn classify(err: serde_yaml::Error) -> SpecError {
    let message = err.to_string();
    if message.contains("unknown field") {
        SpecError::UnknownField(message)
    } else {
        SpecError::Malformed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_cloud::ErrorKind;

    #[test]
    fn test_load_minimal() {
        let doc = load_spec_str("openstack:\n  domains:\n    - name: acme\n").unwrap();
        assert_eq!(doc.domains.len(), 1);
        assert_eq!(doc.domains[0].enabled, Some(true));
    }

    #[test]
    fn test_unknown_field_is_named() {
        let err = load_spec_str("openstack:\n  domains:\n    - name: acme\n      colour: red\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SpecUnknownField);
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_duplicate_key_is_malformed() {
        let err = load_spec_str(
            "openstack:\n  domains:\n    - name: acme\n      projects:\n        - name: ops\n          compute_quota:\n            cores: 1\n            cores: 2\n",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SpecMalformed);
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = load_spec(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SpecMalformed);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_spec_file("/nonexistent/seed.yaml").unwrap_err();
        assert!(matches!(err, SpecError::Io { .. }));
    }
}
