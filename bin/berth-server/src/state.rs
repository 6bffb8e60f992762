//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::catalog::CatalogService;
use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// The cataloging engine; owns the store and the repository syncer.
    pub catalog: Arc<CatalogService>,
}
