//! API route modules, mounted under `/api/v1alpha1`.

pub mod catalogs;
pub mod events;
pub mod locks;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Aggregates every API route group.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(locks::routes())
        .merge(catalogs::routes())
}
