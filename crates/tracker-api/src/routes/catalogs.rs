//! Catalog API routes.
//!
//! ## Routes
//!
//! - `PUT  /catalogs` - Create or update an entry (upsert by name)
//! - `GET  /catalogs` - List entries
//! - `GET  /catalogs/compliance` - Version-compliance report
//! - `GET  /catalogs/{name}` - Get an entry
//! - `DELETE /catalogs/{name}` - Delete an entry
//! - `PUT  /catalogs/{name}/versions` - Replace the version triple

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tracker_core::CatalogEntry;
use tracker_engine::{
    CatalogPage, ComplianceReport, CreateUpdateCatalogRequest, UpdateVersionsRequest,
};

use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Response wrapping a single catalog entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogResponse {
    /// The entry.
    pub catalog: CatalogEntry,
}

/// Creates catalog routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/catalogs", put(create_update_catalog).get(list_catalogs))
        .route("/catalogs/compliance", get(version_compliance))
        .route("/catalogs/:name", get(get_catalog).delete(delete_catalog))
        .route("/catalogs/:name/versions", put(update_versions))
}

/// Create or update a catalog entry (upsert keyed by name).
#[utoipa::path(
    put,
    path = "/api/v1alpha1/catalogs",
    tag = "catalogs",
    request_body = CreateUpdateCatalogRequest,
    responses(
        (status = 200, description = "Entry upserted", body = CatalogResponse),
        (status = 400, description = "Missing required field", body = ApiErrorBody),
    )
)]
pub(crate) async fn create_update_catalog(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUpdateCatalogRequest>,
) -> ApiResult<Json<CatalogResponse>> {
    let catalog = state
        .catalogs
        .create_update(req)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(CatalogResponse { catalog }))
}

/// List catalog entries.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/catalogs",
    tag = "catalogs",
    responses(
        (status = 200, description = "Entries listed", body = CatalogPage),
    )
)]
pub(crate) async fn list_catalogs(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CatalogPage>> {
    Ok(Json(state.catalogs.list().await.map_err(ApiError::from)?))
}

/// Get a catalog entry by name.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/catalogs/{name}",
    tag = "catalogs",
    params(("name" = String, Path, description = "Entry name")),
    responses(
        (status = 200, description = "Entry found", body = CatalogResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_catalog(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<CatalogResponse>> {
    let catalog = state.catalogs.get(&name).await.map_err(ApiError::from)?;
    Ok(Json(CatalogResponse { catalog }))
}

/// Delete a catalog entry by name.
#[utoipa::path(
    delete,
    path = "/api/v1alpha1/catalogs/{name}",
    tag = "catalogs",
    params(("name" = String, Path, description = "Entry name")),
    responses(
        (status = 204, description = "Entry deleted"),
    )
)]
pub(crate) async fn delete_catalog(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalogs.delete(&name).await.map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the version triple of an entry.
#[utoipa::path(
    put,
    path = "/api/v1alpha1/catalogs/{name}/versions",
    tag = "catalogs",
    params(("name" = String, Path, description = "Entry name")),
    request_body = UpdateVersionsRequest,
    responses(
        (status = 200, description = "Versions updated", body = CatalogResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn update_versions(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateVersionsRequest>,
) -> ApiResult<Json<CatalogResponse>> {
    let catalog = state
        .catalogs
        .update_versions(&name, req)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(CatalogResponse { catalog }))
}

/// Version-compliance report over the full catalog.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/catalogs/compliance",
    tag = "catalogs",
    responses(
        (status = 200, description = "Compliance report", body = ComplianceReport),
    )
)]
pub(crate) async fn version_compliance(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ComplianceReport>> {
    Ok(Json(
        state
            .catalogs
            .version_compliance()
            .await
            .map_err(ApiError::from)?,
    ))
}
