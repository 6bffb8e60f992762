//! Resource catalog routes (`/api/resources/...`).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use berth_core::ResourceKind;

use crate::catalog::ListParams;
use crate::db::Resource;
use crate::error::ServerError;
use crate::schemas::{
    CreateResourceRequest, ListResourcesQuery, ResourceHealthResponse, ResourceListResponse,
    SyncResponse,
};
use crate::state::AppState;

/// Register resource routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resources", get(list_resources).post(create_resource))
        .route("/resources/{id}", get(read_resource).delete(delete_resource))
        .route("/resources/slug/{slug}", get(read_resource_by_slug))
        .route("/resources/{id}/sync", axum::routing::post(sync_resource))
        .route("/resources/{id}/health", get(resource_health))
}

/// List resources with filters, full-text search, and pagination
/// (`GET /api/resources`).
#[utoipa::path(
    get,
    path = "/api/resources",
    tag = "resources",
    params(ListResourcesQuery),
    responses(
        (status = 200, description = "Filtered resource page", body = ResourceListResponse),
        (status = 400, description = "Invalid filter value"),
    )
)]
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListResourcesQuery>,
) -> Result<Json<ResourceListResponse>, ServerError> {
    let kind = query
        .kind
        .as_deref()
        .map(|raw| {
            ResourceKind::from_str(raw)
                .map_err(|_| ServerError::BadRequest(format!("unknown kind: {raw}")))
        })
        .transpose()?;

    let (items, total) = state
        .catalog
        .list(ListParams {
            q: query.q,
            kind,
            tag: query.tag,
            owner: query.owner,
            limit: query.limit.unwrap_or(50),
            offset: query.offset.unwrap_or(0),
        })
        .await?;
    Ok(Json(ResourceListResponse { items, total }))
}

/// Create or update a resource (`POST /api/resources`).
///
/// Accepts either a manual-metadata payload or a repository reference; the
/// engine reconciles against existing entries by slug, then repository URL.
#[utoipa::path(
    post,
    path = "/api/resources",
    tag = "resources",
    request_body = CreateResourceRequest,
    responses(
        (status = 200, description = "Reconciled resource", body = Resource),
        (status = 409, description = "Slug or repository URL conflict"),
        (status = 422, description = "Invalid descriptor"),
        (status = 502, description = "Repository sync failed"),
    )
)]
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateResourceRequest>,
) -> Result<Json<Resource>, ServerError> {
    let resource = state.catalog.create_or_update(request).await?;
    Ok(Json(resource))
}

/// Fetch one resource by numeric ID (`GET /api/resources/{id}`).
#[utoipa::path(
    get,
    path = "/api/resources/{id}",
    tag = "resources",
    params(("id" = i64, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource", body = Resource),
        (status = 404, description = "No such resource"),
    )
)]
pub async fn read_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Resource>, ServerError> {
    Ok(Json(state.catalog.get(id).await?))
}

/// Fetch one resource by slug (`GET /api/resources/slug/{slug}`).
#[utoipa::path(
    get,
    path = "/api/resources/slug/{slug}",
    tag = "resources",
    params(("slug" = String, Path, description = "Resource slug")),
    responses(
        (status = 200, description = "Resource", body = Resource),
        (status = 404, description = "No such resource"),
    )
)]
pub async fn read_resource_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Resource>, ServerError> {
    Ok(Json(state.catalog.get_by_slug(&slug).await?))
}

/// Delete a resource and its search-index entry
/// (`DELETE /api/resources/{id}`).
#[utoipa::path(
    delete,
    path = "/api/resources/{id}",
    tag = "resources",
    params(("id" = i64, Path, description = "Resource ID")),
    responses((status = 204, description = "Deleted (or already absent)"))
)]
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-sync an existing repository-sourced resource
/// (`POST /api/resources/{id}/sync`).
#[utoipa::path(
    post,
    path = "/api/resources/{id}/sync",
    tag = "resources",
    params(("id" = i64, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Refreshed resource", body = SyncResponse),
        (status = 400, description = "Resource has no repository source"),
        (status = 404, description = "No such resource"),
        (status = 502, description = "Repository sync failed"),
    )
)]
pub async fn sync_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SyncResponse>, ServerError> {
    let resource = state.catalog.resync(id).await?;
    Ok(Json(SyncResponse { resource, refreshed: true }))
}

/// Current health status of one resource
/// (`GET /api/resources/{id}/health`).
#[utoipa::path(
    get,
    path = "/api/resources/{id}/health",
    tag = "resources",
    params(("id" = i64, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Health status", body = ResourceHealthResponse),
        (status = 404, description = "No such resource"),
    )
)]
pub async fn resource_health(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ResourceHealthResponse>, ServerError> {
    let resource = state.catalog.get(id).await?;
    Ok(Json(ResourceHealthResponse {
        resource_id: resource.id,
        status: resource.health_status,
        checked_at: resource.health_checked_at,
    }))
}
