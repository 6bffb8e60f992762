use utoipa::OpenApi;

use crate::routes::{health, resources};
use crate::schemas;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "berth-server",
        description = "Berth resource catalog API",
        version = "0.1.0",
    ),
    paths(
        health::get_health,
        resources::list_resources,
        resources::create_resource,
        resources::read_resource,
        resources::read_resource_by_slug,
        resources::delete_resource,
        resources::sync_resource,
        resources::resource_health,
    ),
    components(schemas(
        crate::db::Resource,
        crate::db::ResourceSource,
        crate::db::HealthStatus,
        schemas::CreateResourceRequest,
        schemas::ResourceListResponse,
        schemas::SyncResponse,
        schemas::ResourceHealthResponse,
    ))
)]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
