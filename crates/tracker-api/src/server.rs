//! HTTP server assembly: shared state, routers, listeners, and graceful
//! shutdown.
//!
//! Two listeners run side by side: the API/gateway server (REST routes,
//! swagger, `/config.js`, SPA fallback) and the metrics server. Both drain
//! in-flight requests on SIGINT/SIGTERM; the storage client is dropped last
//! when the process unwinds.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use tracker_core::{Error, Result};
use tracker_engine::{CatalogService, EventEngine, LockArbiter, PrometheusLifecycleMetrics};
use tracker_store::{MemoryCatalogRepository, MemoryEventRepository, MemoryLockRepository};

use crate::config::Config;
use crate::frontend;
use crate::metrics::serve_metrics;
use crate::openapi::ApiDoc;
use crate::routes;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Event engine.
    pub events: EventEngine,
    /// Lock arbiter.
    pub locks: LockArbiter,
    /// Catalog service.
    pub catalogs: CatalogService,
}

impl AppState {
    /// Creates state over already-wired engines.
    #[must_use]
    pub fn new(
        config: Config,
        events: EventEngine,
        locks: LockArbiter,
        catalogs: CatalogService,
    ) -> Self {
        Self {
            config,
            events,
            locks,
            catalogs,
        }
    }

    /// Creates state over in-memory repositories (tests and development).
    #[must_use]
    pub fn with_memory_repositories(config: Config) -> Self {
        let events = Arc::new(MemoryEventRepository::new());
        let locks = Arc::new(MemoryLockRepository::new());
        let catalogs = Arc::new(MemoryCatalogRepository::new());

        let arbiter = LockArbiter::new(locks, events.clone());
        let engine = EventEngine::new(
            events,
            arbiter.clone(),
            Arc::new(PrometheusLifecycleMetrics),
        );
        let catalog_service = CatalogService::new(catalogs);
        Self::new(config, engine, arbiter, catalog_service)
    }
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn swagger_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Builds the API/gateway router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/swagger.json", get(swagger_json))
        .route("/docs", get(frontend::docs))
        .route("/config.js", get(frontend::config_js))
        .nest("/api/v1alpha1", routes::api_routes())
        .fallback(frontend::spa_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the metrics router.
#[must_use]
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(serve_metrics))
}

/// Serves the API and metrics listeners until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns a dependency error when a listener cannot bind or serving
/// fails.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let http_addr = format!("0.0.0.0:{}", state.config.http_port);
    let metrics_addr = format!("0.0.0.0:{}", state.config.metrics_port);

    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .map_err(|e| Error::dependency_with_source(format!("failed to bind {http_addr}"), e))?;
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .map_err(|e| Error::dependency_with_source(format!("failed to bind {metrics_addr}"), e))?;

    tracing::info!(addr = %http_addr, "HTTP server listening");
    tracing::info!(addr = %http_addr, "Swagger UI available at /docs");
    tracing::info!(addr = %metrics_addr, "metrics server listening");

    let app = router(state);
    let http = axum::serve(http_listener, app).with_graceful_shutdown(shutdown_signal());
    let metrics = axum::serve(metrics_listener, metrics_router())
        .with_graceful_shutdown(shutdown_signal());

    let (http_result, metrics_result) = tokio::join!(http, metrics);
    http_result.map_err(|e| Error::dependency_with_source("HTTP server failed", e))?;
    metrics_result.map_err(|e| Error::dependency_with_source("metrics server failed", e))?;

    tracing::info!("servers stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutting down servers...");
}

/// Wires MongoDB-backed engines and serves until shutdown.
///
/// Startup order: connect, ensure indexes (bounded to 30s), build engines,
/// listen.
///
/// # Errors
///
/// Returns a dependency error when the store is unreachable, index
/// ensuring fails, or a listener cannot bind.
pub async fn run(config: Config) -> Result<()> {
    let db = tracker_store::connect(&config.store).await?;
    tracker_store::ensure_indexes(&db).await?;

    let events = Arc::new(tracker_store::MongoEventRepository::new(&db));
    let locks = Arc::new(tracker_store::MongoLockRepository::new(&db));
    let catalogs = Arc::new(tracker_store::MongoCatalogRepository::new(&db));

    let arbiter = LockArbiter::new(locks, events.clone());
    let engine = EventEngine::new(
        events,
        arbiter.clone(),
        Arc::new(PrometheusLifecycleMetrics),
    );
    let catalog_service = CatalogService::new(catalogs);

    let state = Arc::new(AppState::new(config, engine, arbiter, catalog_service));
    serve(state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_state_builds_router() {
        let state = Arc::new(AppState::with_memory_repositories(Config::default()));
        let _router = router(state);
        let _metrics = metrics_router();
    }
}
