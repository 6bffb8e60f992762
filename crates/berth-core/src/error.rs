//! Error taxonomy for the domain layer.
//!
//! [`DescriptorError`] covers everything that can go wrong while turning a
//! `berth.yaml` file into a [`crate::ResourceMetadata`] value.  [`SyncError`]
//! covers repository synchronization; a descriptor failure inside a sync is
//! propagated as [`SyncError::Descriptor`] so callers see a single error
//! surface per operation.  Neither is retried automatically.

use std::path::PathBuf;

use thiserror::Error;

/// The descriptor file could not be loaded or is not a valid descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// No `berth.yaml` exists in the metadata root.
    #[error("berth.yaml not found in {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("failed to read berth.yaml: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not parsable YAML, or a field has the wrong shape.
    #[error("failed to parse berth.yaml: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A mandatory field (`kind` or `name`) is missing.
    #[error("berth.yaml is missing required field '{0}'")]
    MissingField(&'static str),
}

/// Repository synchronization failed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A git operation exited non-zero.
    #[error("git {op} failed: {stderr}")]
    Git { op: String, stderr: String },

    /// Filesystem or process-spawn failure around the working copy.
    #[error("sync I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The synced repository does not contain a usable descriptor.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}
