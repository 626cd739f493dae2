//! Event API routes.
//!
//! ## Routes
//!
//! - `POST /events` - Create an event (lock-coordinated)
//! - `GET  /events` - List events
//! - `GET  /events/search` - Search events by filter
//! - `GET  /events/today` - Events of the current UTC day
//! - `POST /events/stats` - Count events in a date range
//! - `POST /events/stats/by-month` - Month-bucketed statistics
//! - `GET  /events/{id}` - Get by UUID or slack id
//! - `PUT  /events/{id}` - Update (changelog-deriving)
//! - `DELETE /events/{id}` - Delete
//! - `GET  /events/{id}/changelog` - Paginated changelog
//! - `POST /events/{id}/changelog` - Append a changelog entry
//! - `POST /events/{id}/slack` - Attach a slack id (one-shot)

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use tracker_core::Event;
use tracker_engine::{
    ChangelogPage, CreateEventRequest, EventPage, EventStats, MonthlyStatsReport,
    NewChangelogEntry, UpdateEventRequest,
};
use tracker_store::{SearchQuery, StatsQuery};

use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Response wrapping a single event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    /// The event.
    pub event: Event,
}

/// Request body for month-bucketed statistics.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StatsByMonthRequest {
    /// Stats filter.
    #[serde(flatten)]
    pub filter: StatsQuery,
    /// Add a secondary grouping by service.
    pub group_by_service: bool,
}

/// Pagination query for the changelog endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct ChangelogPageQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Entries per page (default 50).
    pub per_page: Option<u32>,
}

/// Request body to attach a slack id.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AddSlackIdRequest {
    /// The slack id to attach.
    pub slack_id: String,
}

/// Creates event routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/search", get(search_events))
        .route("/events/today", get(today_events))
        .route("/events/stats", post(event_stats))
        .route("/events/stats/by-month", post(event_stats_by_month))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/events/:id/changelog",
            get(get_event_changelog).post(add_changelog_entry),
        )
        .route("/events/:id/slack", post(add_slack_id))
}

/// Create an event.
#[utoipa::path(
    post,
    path = "/api/v1alpha1/events",
    tag = "events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Bad request", body = ApiErrorBody),
        (status = 404, description = "Related event not found", body = ApiErrorBody),
        (status = 409, description = "Service already locked", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    )
)]
pub(crate) async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let event = state.events.create_event(req).await.map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(EventResponse { event })))
}

/// List every event.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/events",
    tag = "events",
    responses(
        (status = 200, description = "Events listed", body = EventPage),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    )
)]
pub(crate) async fn list_events(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<EventPage>> {
    Ok(Json(state.events.list_events().await.map_err(ApiError::from)?))
}

/// Search events with a non-empty filter.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/events/search",
    tag = "events",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching events", body = EventPage),
        (status = 400, description = "Empty or invalid filter", body = ApiErrorBody),
    )
)]
pub(crate) async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<EventPage>> {
    Ok(Json(
        state
            .events
            .search_events(&query)
            .await
            .map_err(ApiError::from)?,
    ))
}

/// List events of the current UTC day.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/events/today",
    tag = "events",
    responses(
        (status = 200, description = "Today's events", body = EventPage),
    )
)]
pub(crate) async fn today_events(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<EventPage>> {
    Ok(Json(state.events.today_events().await.map_err(ApiError::from)?))
}

/// Get an event by UUID or slack id.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/events/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event UUID or slack id")),
    responses(
        (status = 200, description = "Event found", body = EventResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EventResponse>> {
    let event = state.events.get_event(&id).await.map_err(ApiError::from)?;
    Ok(Json(EventResponse { event }))
}

/// Update an event; changelog entries derive from the diff.
#[utoipa::path(
    put,
    path = "/api/v1alpha1/events/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event UUID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut req): Json<UpdateEventRequest>,
) -> ApiResult<Json<EventResponse>> {
    req.id = id;
    let event = state.events.update_event(req).await.map_err(ApiError::from)?;
    Ok(Json(EventResponse { event }))
}

/// Delete an event by id.
#[utoipa::path(
    delete,
    path = "/api/v1alpha1/events/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event UUID")),
    responses(
        (status = 204, description = "Event deleted"),
    )
)]
pub(crate) async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.events.delete_event(&id).await.map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Read one page of an event's changelog.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/events/{id}/changelog",
    tag = "events",
    params(
        ("id" = String, Path, description = "Event UUID"),
        ChangelogPageQuery,
    ),
    responses(
        (status = 200, description = "Changelog page", body = ChangelogPage),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn get_event_changelog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ChangelogPageQuery>,
) -> ApiResult<Json<ChangelogPage>> {
    Ok(Json(
        state
            .events
            .get_event_changelog(&id, query.page, query.per_page)
            .await
            .map_err(ApiError::from)?,
    ))
}

/// Append a changelog entry.
#[utoipa::path(
    post,
    path = "/api/v1alpha1/events/{id}/changelog",
    tag = "events",
    params(("id" = String, Path, description = "Event UUID")),
    request_body = NewChangelogEntry,
    responses(
        (status = 200, description = "Entry appended", body = EventResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    )
)]
pub(crate) async fn add_changelog_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(entry): Json<NewChangelogEntry>,
) -> ApiResult<Json<EventResponse>> {
    let event = state
        .events
        .add_changelog_entry(&id, entry)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(EventResponse { event }))
}

/// Attach a slack id to an event (one-shot).
#[utoipa::path(
    post,
    path = "/api/v1alpha1/events/{id}/slack",
    tag = "events",
    params(("id" = String, Path, description = "Event UUID")),
    request_body = AddSlackIdRequest,
    responses(
        (status = 200, description = "Slack id attached", body = EventResponse),
        (status = 400, description = "Empty slack id", body = ApiErrorBody),
        (status = 409, description = "Slack id already set", body = ApiErrorBody),
    )
)]
pub(crate) async fn add_slack_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddSlackIdRequest>,
) -> ApiResult<Json<EventResponse>> {
    let event = state
        .events
        .add_slack_id(&id, &req.slack_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(EventResponse { event }))
}

/// Count events in a date range.
#[utoipa::path(
    post,
    path = "/api/v1alpha1/events/stats",
    tag = "stats",
    request_body = StatsQuery,
    responses(
        (status = 200, description = "Event count", body = EventStats),
        (status = 400, description = "Missing or inverted dates", body = ApiErrorBody),
    )
)]
pub(crate) async fn event_stats(
    State(state): State<Arc<AppState>>,
    Json(query): Json<StatsQuery>,
) -> ApiResult<Json<EventStats>> {
    Ok(Json(
        state
            .events
            .get_event_stats(&query)
            .await
            .map_err(ApiError::from)?,
    ))
}

/// Month-bucketed statistics, optionally grouped by service.
#[utoipa::path(
    post,
    path = "/api/v1alpha1/events/stats/by-month",
    tag = "stats",
    request_body = StatsByMonthRequest,
    responses(
        (status = 200, description = "Monthly buckets", body = MonthlyStatsReport),
        (status = 400, description = "Missing or inverted dates", body = ApiErrorBody),
    )
)]
pub(crate) async fn event_stats_by_month(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StatsByMonthRequest>,
) -> ApiResult<Json<MonthlyStatsReport>> {
    Ok(Json(
        state
            .events
            .get_event_stats_by_month(&req.filter, req.group_by_service)
            .await
            .map_err(ApiError::from)?,
    ))
}
