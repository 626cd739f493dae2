//! Lock API routes.
//!
//! ## Routes
//!
//! - `POST /locks` - Acquire a lock
//! - `GET  /locks` - List held locks
//! - `GET  /locks/{id}` - Get a lock
//! - `PUT  /locks/{id}` - Update lock fields
//! - `DELETE /locks/{id}` - Release a lock

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tracker_core::{Lock, UnlockReceipt};
use tracker_engine::{CreateLockRequest, UpdateLockRequest};

use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Response wrapping a single lock.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LockResponse {
    /// The lock.
    pub lock: Lock,
}

/// A list of locks with its count.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LockPage {
    /// Held locks.
    pub locks: Vec<Lock>,
    /// Number of locks returned.
    pub total_count: u64,
}

/// Creates lock routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/locks", post(create_lock).get(list_locks))
        .route(
            "/locks/:id",
            get(get_lock).put(update_lock).delete(unlock),
        )
}

/// Acquire a lock on `(service, environment, resource)`.
#[utoipa::path(
    post,
    path = "/api/v1alpha1/locks",
    tag = "locks",
    request_body = CreateLockRequest,
    responses(
        (status = 201, description = "Lock acquired", body = LockResponse),
        (status = 409, description = "Key already locked", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    )
)]
pub(crate) async fn create_lock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLockRequest>,
) -> ApiResult<impl IntoResponse> {
    let lock = state.locks.create_lock(req).await.map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(LockResponse { lock })))
}

/// List held locks.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/locks",
    tag = "locks",
    responses(
        (status = 200, description = "Locks listed", body = LockPage),
    )
)]
pub(crate) async fn list_locks(State(state): State<Arc<AppState>>) -> ApiResult<Json<LockPage>> {
    let locks = state.locks.list_locks().await.map_err(ApiError::from)?;
    Ok(Json(LockPage {
        total_count: locks.len() as u64,
        locks,
    }))
}

/// Get a lock by id.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/locks/{id}",
    tag = "locks",
    params(("id" = String, Path, description = "Lock UUID")),
    responses(
        (status = 200, description = "Lock found", body = LockResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_lock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<LockResponse>> {
    let lock = state.locks.get_lock(&id).await.map_err(ApiError::from)?;
    Ok(Json(LockResponse { lock }))
}

/// Update the provided (non-empty) fields of a lock.
#[utoipa::path(
    put,
    path = "/api/v1alpha1/locks/{id}",
    tag = "locks",
    params(("id" = String, Path, description = "Lock UUID")),
    request_body = UpdateLockRequest,
    responses(
        (status = 200, description = "Lock updated", body = LockResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn update_lock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLockRequest>,
) -> ApiResult<Json<LockResponse>> {
    let lock = state
        .locks
        .update_lock(&id, req)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(LockResponse { lock }))
}

/// Release a lock by id.
#[utoipa::path(
    delete,
    path = "/api/v1alpha1/locks/{id}",
    tag = "locks",
    params(("id" = String, Path, description = "Lock UUID")),
    responses(
        (status = 200, description = "Lock released", body = UnlockReceipt),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn unlock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<UnlockReceipt>> {
    let receipt = state.locks.unlock(&id).await.map_err(ApiError::from)?;
    Ok(Json(receipt))
}
