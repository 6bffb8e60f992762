//! Request / response types for the resource API (`/api/resources/...`).

use berth_core::ResourceMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::{HealthStatus, Resource};

/// Body for `POST /api/resources`.
///
/// A tagged variant: the `source_type` discriminator selects between a
/// manual metadata payload and a repository to sync from.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "source_type", rename_all = "lowercase")]
pub enum CreateResourceRequest {
    /// Caller-supplied metadata, cataloged as-is.
    Manual {
        #[schema(value_type = Object)]
        metadata: ResourceMetadata,
    },
    /// Metadata synchronized from a git repository's descriptor file.
    Repository {
        repo_url: String,
        branch: Option<String>,
        subpath: Option<String>,
    },
}

/// Query parameters for `GET /api/resources`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListResourcesQuery {
    /// Full-text search query.
    pub q: Option<String>,
    /// One of `app`, `dataset`, `model`.
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub owner: Option<String>,
    /// Page size, clamped to 1–200 (default 50).
    pub limit: Option<i64>,
    /// Page start, minimum 0 (default 0).
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceListResponse {
    pub items: Vec<Resource>,
    /// Full filtered set size, independent of paging.
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub resource: Resource,
    pub refreshed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceHealthResponse {
    pub resource_id: i64,
    pub status: HealthStatus,
    pub checked_at: Option<DateTime<Utc>>,
}
