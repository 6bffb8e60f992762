//! berth-core – domain layer of the Berth resource catalog.
//!
//! Everything in this crate is independent of the HTTP server and the
//! persistent store:
//! - [`slug`] – URL-safe identifier derivation.
//! - [`metadata`] – the normalized [`ResourceMetadata`] value produced by the
//!   descriptor loader or supplied directly by a manual create request.
//! - [`descriptor`] – reads `berth.yaml` from a directory and normalizes it.
//! - [`sync`] – keeps a local working copy of a git repository up to date and
//!   loads the descriptor from it.
//! - [`error`] – the [`DescriptorError`] / [`SyncError`] taxonomy.

pub mod descriptor;
pub mod error;
pub mod metadata;
pub mod slug;
pub mod sync;

pub use error::{DescriptorError, SyncError};
pub use metadata::{ResourceKind, ResourceMetadata};
pub use sync::{RepoSyncResult, RepoSyncer};
