//! Descriptor loading.
//!
//! A descriptor is a `berth.yaml` file at the root of a metadata directory.
//! [`load_metadata`] checks the mandatory `kind` / `name` keys on the parsed
//! mapping before the typed decode so that an absent key is reported as
//! [`DescriptorError::MissingField`] rather than a generic parse failure.
//! Unknown keys are ignored.

use std::path::Path;

use crate::error::DescriptorError;
use crate::metadata::ResourceMetadata;

/// Well-known descriptor file name within a metadata root.
pub const DESCRIPTOR_FILE: &str = "berth.yaml";

/// Read and normalize the descriptor found in `root`.
pub fn load_metadata(root: &Path) -> Result<ResourceMetadata, DescriptorError> {
    let descriptor_path = root.join(DESCRIPTOR_FILE);
    if !descriptor_path.is_file() {
        return Err(DescriptorError::NotFound(root.to_path_buf()));
    }
    let raw = std::fs::read_to_string(&descriptor_path)?;

    let doc: serde_yaml_ng::Value = serde_yaml_ng::from_str(&raw)?;
    for field in ["kind", "name"] {
        if doc.get(field).is_none() {
            return Err(DescriptorError::MissingField(field));
        }
    }

    let metadata: ResourceMetadata = serde_yaml_ng::from_value(doc)?;
    Ok(metadata)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::ResourceKind;

    fn write_descriptor(dir: &Path, body: &str) {
        std::fs::write(dir.join(DESCRIPTOR_FILE), body).unwrap();
    }

    #[test]
    fn loads_full_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "kind: app\n\
             name: Vector Dashboard\n\
             description: Self-hosted dashboard\n\
             tags:\n  - dashboard\n  - internal\n\
             url: http://localhost:9000\n\
             healthcheck: /health\n\
             owner: '@alice'\n\
             license: MIT\n\
             updated: 2024-05-04\n\
             some_future_key: ignored\n",
        );

        let metadata = load_metadata(dir.path()).unwrap();
        assert_eq!(metadata.kind, ResourceKind::App);
        assert_eq!(metadata.name, "Vector Dashboard");
        assert_eq!(metadata.tags, vec!["dashboard", "internal"]);
        assert_eq!(metadata.healthcheck.as_deref(), Some("/health"));
        assert!(metadata.updated.is_some());
        assert!(metadata.repo.is_none());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_metadata(dir.path()),
            Err(DescriptorError::NotFound(_))
        ));
    }

    #[test]
    fn missing_kind_is_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "name: No Kind\n");
        assert!(matches!(
            load_metadata(dir.path()),
            Err(DescriptorError::MissingField("kind"))
        ));
    }

    #[test]
    fn missing_name_is_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "kind: app\n");
        assert!(matches!(
            load_metadata(dir.path()),
            Err(DescriptorError::MissingField("name"))
        ));
    }

    #[test]
    fn unparsable_yaml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "kind: [unterminated\n");
        assert!(matches!(
            load_metadata(dir.path()),
            Err(DescriptorError::Parse(_))
        ));
    }

    #[test]
    fn invalid_kind_value_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "kind: gadget\nname: Demo\n");
        assert!(matches!(
            load_metadata(dir.path()),
            Err(DescriptorError::Parse(_))
        ));
    }

    #[test]
    fn unparsable_updated_is_dropped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "kind: app\nname: Demo\nupdated: soonish\n");
        let metadata = load_metadata(dir.path()).unwrap();
        assert!(metadata.updated.is_none());
    }
}
