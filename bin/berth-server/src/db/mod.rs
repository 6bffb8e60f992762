//! Database abstraction layer.
//!
//! [`ResourceStore`] is the persistent catalog; [`SearchStore`] is the
//! derived full-text index kept consistent with it by the cataloging
//! engine.  The default implementation of both is
//! [`sqlite::SqliteStore`]; to swap databases, implement the traits for a
//! new type and change the concrete type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures (stable since
//! Rust 1.75) so no extra `async-trait` crate is required.

pub mod sqlite;

use std::future::Future;

use berth_core::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Where a resource's current data came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceSource {
    Manual,
    Repository,
}

/// Last recorded health of a resource's live URL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Up,
    Down,
}

/// A single row in the `resources` table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Resource {
    pub id: i64,
    #[schema(value_type = String)]
    pub kind: ResourceKind,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub repo_url: Option<String>,
    pub owner: Option<String>,
    pub thumbnail_path: Option<String>,
    pub license: Option<String>,
    pub healthcheck_path: Option<String>,
    /// Caller-declared content timestamp (distinct from system timestamps).
    pub updated_at: Option<DateTime<Utc>>,
    /// Set on every repository-sourced reconciliation.
    pub last_synced_at: Option<DateTime<Utc>>,
    pub health_status: HealthStatus,
    /// Written exclusively by the health monitor.
    pub health_checked_at: Option<DateTime<Utc>>,
    pub source: ResourceSource,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Resource {
    /// Space-joined tags, the denormalized form stored in the search index.
    pub fn tags_text(&self) -> String {
        self.tags.join(" ")
    }
}

/// Filters applied by [`ResourceStore::list_resources`] /
/// [`ResourceStore::count_resources`].
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub kind: Option<ResourceKind>,
    pub tag: Option<String>,
    pub owner: Option<String>,
    /// Restrict to this ID set (the search index's result).  An empty list
    /// matches nothing.
    pub ids: Option<Vec<i64>>,
}

/// A probe target for the health monitor: every resource with a live URL.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub id: i64,
    pub url: String,
    pub healthcheck_path: Option<String>,
}

/// One health-check result to be recorded.
#[derive(Debug, Clone)]
pub struct HealthSample {
    pub resource_id: i64,
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
}

/// Trait for the persistent resource catalog.
pub trait ResourceStore: Send + Sync + 'static {
    /// Insert a new resource (the `id` field is ignored) and return the
    /// assigned surrogate key.
    fn insert_resource(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Overwrite every mutable column of an existing resource.
    fn update_resource(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_resource(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Resource>, sqlx::Error>> + Send;

    fn get_by_slug(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Resource>, sqlx::Error>> + Send;

    fn get_by_repo_url(
        &self,
        repo_url: &str,
    ) -> impl Future<Output = Result<Option<Resource>, sqlx::Error>> + Send;

    /// Every slug currently in the catalog, for collision avoidance.
    fn list_slugs(&self) -> impl Future<Output = Result<Vec<String>, sqlx::Error>> + Send;

    /// Filtered page ordered by `modified_at` descending.
    fn list_resources(
        &self,
        filter: &ResourceFilter,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<Vec<Resource>, sqlx::Error>> + Send;

    /// Size of the full filtered set, independent of paging.
    fn count_resources(
        &self,
        filter: &ResourceFilter,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Returns `true` if a row was deleted.
    fn delete_resource(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Every resource with a non-null URL, for the health monitor.
    fn list_monitored(&self) -> impl Future<Output = Result<Vec<ProbeTarget>, sqlx::Error>> + Send;

    /// Record a whole monitor tick's results in one transaction.
    fn record_health_batch(
        &self,
        samples: &[HealthSample],
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Trait for the derived full-text search index.
pub trait SearchStore: Send + Sync + 'static {
    /// Replace the index entry for this resource in full (idempotent).
    fn upsert_search(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn remove_search(&self, id: i64) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Ranked resource IDs for a free-text query, most relevant first.
    /// A query with no indexable terms yields an empty list.
    fn search_ids(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<i64>, sqlx::Error>> + Send;
}
