//! The cataloging engine: reconciles incoming metadata against the
//! persistent catalog and keeps the search index consistent with it.
//!
//! Identity resolution is an explicit ordered contract: (1) exact match on
//! the slug derived from the incoming name, (2) exact match on the
//! repository URL, (3) no match → create.  The ordering determines
//! update-vs-create behavior and is covered by tests.
//!
//! The catalog row and its search-index entry live in the same SQLite file
//! but are committed separately (row first, index second).  A crash between
//! the two leaves the index stale for that resource until the next
//! reconciliation; the index upsert is idempotent, so re-running
//! `create_or_update` is always a safe repair.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use berth_core::{slug, RepoSyncer, ResourceMetadata};
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use crate::db::sqlite::SqliteStore;
use crate::db::{Resource, ResourceFilter, ResourceSource, ResourceStore, SearchStore};
use crate::error::ServerError;
use crate::schemas::CreateResourceRequest;

/// Parameters for [`CatalogService::list`], already parsed from the query
/// string.
#[derive(Debug, Default)]
pub struct ListParams {
    pub q: Option<String>,
    pub kind: Option<berth_core::ResourceKind>,
    pub tag: Option<String>,
    pub owner: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// The reconciler between incoming metadata and the persistent catalog.
#[derive(Debug)]
pub struct CatalogService {
    store: Arc<SqliteStore>,
    syncer: RepoSyncer,
}

impl CatalogService {
    pub fn new(store: Arc<SqliteStore>, repo_dir: impl Into<PathBuf>) -> Self {
        Self { store, syncer: RepoSyncer::new(repo_dir) }
    }

    /// Apply a create-or-update request and return the reconciled resource.
    pub async fn create_or_update(
        &self,
        request: CreateResourceRequest,
    ) -> Result<Resource, ServerError> {
        match request {
            CreateResourceRequest::Manual { metadata } => {
                let resource = self.apply_metadata(metadata, ResourceSource::Manual).await?;
                self.store.upsert_search(&resource).await?;
                Ok(resource)
            }
            CreateResourceRequest::Repository { repo_url, branch, subpath } => {
                let outcome = self
                    .syncer
                    .sync(&repo_url, branch.as_deref(), subpath.as_deref())
                    .await?;
                debug!(
                    repo_url,
                    readme = outcome.readme.is_some(),
                    root = %outcome.metadata_root.display(),
                    "repository synced"
                );

                let mut resource = self
                    .apply_metadata(outcome.metadata, ResourceSource::Repository)
                    .await?;
                // The resource is always reachable by the URL it was synced
                // from, even when the descriptor names a different `repo`.
                resource.repo_url = Some(repo_url);
                resource.last_synced_at = Some(Utc::now());
                self.store
                    .update_resource(&resource)
                    .await
                    .map_err(conflict_or_db)?;
                self.store.upsert_search(&resource).await?;
                Ok(resource)
            }
        }
    }

    /// List resources with filters, pagination, and optional full-text
    /// search.  With a query, results follow the search index's relevance
    /// order; without one, `modified_at` descending.
    pub async fn list(&self, params: ListParams) -> Result<(Vec<Resource>, i64), ServerError> {
        let limit = params.limit.clamp(1, 200);
        let offset = params.offset.max(0);
        let mut filter = ResourceFilter {
            kind: params.kind,
            tag: params.tag,
            owner: params.owner,
            ids: None,
        };

        if let Some(query) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let ids = self.store.search_ids(query).await?;
            if ids.is_empty() {
                return Ok((Vec::new(), 0));
            }
            filter.ids = Some(ids.clone());
            let mut rows = self
                .store
                .list_resources(&filter, ids.len() as i64, 0)
                .await?;
            let total = rows.len() as i64;

            let rank: HashMap<i64, usize> =
                ids.iter().enumerate().map(|(pos, id)| (*id, pos)).collect();
            rows.sort_by_key(|r| rank.get(&r.id).copied().unwrap_or(usize::MAX));
            let page = rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            return Ok((page, total));
        }

        let total = self.store.count_resources(&filter).await?;
        let rows = self.store.list_resources(&filter, limit, offset).await?;
        Ok((rows, total))
    }

    pub async fn get(&self, id: i64) -> Result<Resource, ServerError> {
        self.store
            .get_resource(id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("resource {id} not found")))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Resource, ServerError> {
        self.store
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("resource '{slug}' not found")))
    }

    /// Remove the catalog row and its search-index entry.  A missing id is
    /// a no-op, not an error.
    pub async fn delete(&self, id: i64) -> Result<(), ServerError> {
        if self.store.delete_resource(id).await? {
            self.store.remove_search(id).await?;
            info!(resource_id = id, "resource deleted");
        }
        Ok(())
    }

    /// Re-run the repository sync for an existing repository-sourced
    /// resource.
    pub async fn resync(&self, id: i64) -> Result<Resource, ServerError> {
        let resource = self.get(id).await?;
        let Some(repo_url) = resource.repo_url else {
            return Err(ServerError::BadRequest(
                "resource does not have a repository source".to_owned(),
            ));
        };
        self.create_or_update(CreateResourceRequest::Repository {
            repo_url,
            branch: None,
            subpath: None,
        })
        .await
    }

    // ── Reconciliation ────────────────────────────────────────────────────────

    /// Reconcile one metadata value into the catalog: resolve identity,
    /// then create or update in place.  The row write commits here; the
    /// search-index upsert is the caller's follow-up commit.
    async fn apply_metadata(
        &self,
        metadata: ResourceMetadata,
        source: ResourceSource,
    ) -> Result<Resource, ServerError> {
        let candidate = slug::slugify(&metadata.name);
        let existing = self.resolve_existing(&candidate, &metadata).await?;
        let now = Utc::now();
        let updated_at = metadata.updated.map(|naive| Utc.from_utc_datetime(&naive));

        match existing {
            Some(mut resource) => {
                if resource.slug != candidate {
                    // The name changed.  The slug follows it, de-duplicated
                    // against every slug except this resource's own so the
                    // global uniqueness invariant holds.
                    let others: Vec<String> = self
                        .store
                        .list_slugs()
                        .await?
                        .into_iter()
                        .filter(|s| *s != resource.slug)
                        .collect();
                    resource.slug = slug::slugify_unique(&metadata.name, &others);
                }

                // Every descriptive field is overwritten, absent values
                // included: stale data must not survive a reconciliation.
                resource.kind = metadata.kind;
                resource.name = metadata.name;
                resource.description = metadata.description;
                resource.tags = metadata.tags;
                resource.url = metadata.url;
                resource.path = metadata.path;
                resource.owner = metadata.owner;
                resource.license = metadata.license;
                resource.thumbnail_path = metadata.thumbnail;
                resource.healthcheck_path = metadata.healthcheck;
                resource.source = source;
                if let Some(repo) = metadata.repo {
                    resource.repo_url = Some(repo);
                }
                if let Some(updated) = updated_at {
                    resource.updated_at = Some(updated);
                }
                resource.modified_at = now;

                self.store
                    .update_resource(&resource)
                    .await
                    .map_err(conflict_or_db)?;
                debug!(resource_id = resource.id, slug = %resource.slug, "resource updated");
                Ok(resource)
            }
            None => {
                let slugs = self.store.list_slugs().await?;
                let unique_slug = slug::slugify_unique(&metadata.name, &slugs);
                let mut resource = Resource {
                    id: 0,
                    kind: metadata.kind,
                    name: metadata.name,
                    slug: unique_slug,
                    description: metadata.description,
                    tags: metadata.tags,
                    url: metadata.url,
                    path: metadata.path,
                    repo_url: metadata.repo,
                    owner: metadata.owner,
                    thumbnail_path: metadata.thumbnail,
                    license: metadata.license,
                    healthcheck_path: metadata.healthcheck,
                    updated_at,
                    last_synced_at: None,
                    health_status: crate::db::HealthStatus::Unknown,
                    health_checked_at: None,
                    source,
                    created_at: now,
                    modified_at: now,
                };
                resource.id = self
                    .store
                    .insert_resource(&resource)
                    .await
                    .map_err(conflict_or_db)?;
                info!(resource_id = resource.id, slug = %resource.slug, "resource created");
                Ok(resource)
            }
        }
    }

    /// Ordered identity-resolution chain: slug first, then repository URL.
    async fn resolve_existing(
        &self,
        candidate_slug: &str,
        metadata: &ResourceMetadata,
    ) -> Result<Option<Resource>, sqlx::Error> {
        if let Some(by_slug) = self.store.get_by_slug(candidate_slug).await? {
            return Ok(Some(by_slug));
        }
        if let Some(repo) = &metadata.repo {
            if let Some(by_repo) = self.store.get_by_repo_url(repo).await? {
                return Ok(Some(by_repo));
            }
        }
        Ok(None)
    }
}

/// Concurrent creations of the same new resource can both miss each other
/// and race to insert the same slug; the store's unique index decides the
/// winner and the loser surfaces as a conflict.
fn conflict_or_db(e: sqlx::Error) -> ServerError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return ServerError::Conflict("slug or repository URL already in use".to_owned());
        }
    }
    ServerError::Database(e)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
